use std::io::Read;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::profile::PatientId;
use super::signals::{AdherenceSample, CategoryReport, SideEffectReport, SignalBatch};

/// Signal backfill import errors. Row-level problems are reported in the
/// summary instead; only an unreadable stream is fatal.
#[derive(Debug, thiserror::Error)]
pub enum SignalImportError {
    #[error("failed to read signal export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid signal CSV data: {0}")]
    Csv(#[from] csv::Error),
}

/// A row the importer could not turn into a signal, with its 1-based data
/// row number for operator feedback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    pub row: usize,
    pub reason: String,
}

/// Parsed batches plus per-row accounting.
#[derive(Debug)]
pub struct ParsedImport {
    pub rows: usize,
    pub batches: Vec<SignalBatch>,
    pub skipped: Vec<SkippedRow>,
}

#[derive(Debug, Deserialize)]
struct SignalRow {
    patient_id: String,
    metric: String,
    value: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    observed_at: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc());
    }

    None
}

/// Parse a `patient_id,metric,value,observed_at` CSV export into one merged
/// batch per patient, first-seen order preserved. A later row for the same
/// (patient, metric) overrides the earlier one.
pub fn parse_batches<R: Read>(reader: R, now: DateTime<Utc>) -> Result<ParsedImport, SignalImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut batches: Vec<SignalBatch> = Vec::new();
    let mut skipped = Vec::new();
    let mut rows = 0usize;

    for record in csv_reader.deserialize::<SignalRow>() {
        rows += 1;
        let row = record?;

        if row.patient_id.is_empty() {
            skipped.push(SkippedRow {
                row: rows,
                reason: "missing patient_id".to_string(),
            });
            continue;
        }

        let observed_at = match &row.observed_at {
            Some(raw) => match parse_timestamp(raw) {
                Some(ts) => ts,
                None => {
                    skipped.push(SkippedRow {
                        row: rows,
                        reason: format!("unparseable observed_at '{raw}'"),
                    });
                    continue;
                }
            },
            None => now,
        };

        let signal = match parse_metric(&row.metric, &row.value, observed_at) {
            Ok(signal) => signal,
            Err(reason) => {
                skipped.push(SkippedRow { row: rows, reason });
                continue;
            }
        };

        let patient_id = PatientId(row.patient_id.clone());
        match batches
            .iter_mut()
            .find(|batch| batch.patient_id == patient_id)
        {
            Some(batch) => signal.apply(batch),
            None => {
                let mut batch = SignalBatch::empty(patient_id);
                signal.apply(&mut batch);
                batches.push(batch);
            }
        }
    }

    Ok(ParsedImport {
        rows,
        batches,
        skipped,
    })
}

enum ParsedSignal {
    Medication(AdherenceSample),
    Appointment(AdherenceSample),
    Communication(AdherenceSample),
    Mood(CategoryReport),
    Financial(CategoryReport),
    SideEffect(SideEffectReport),
    MissedAppointments(u32),
}

impl ParsedSignal {
    fn apply(self, batch: &mut SignalBatch) {
        match self {
            ParsedSignal::Medication(sample) => batch.medication = Some(sample),
            ParsedSignal::Appointment(sample) => batch.appointment = Some(sample),
            ParsedSignal::Communication(sample) => batch.communication = Some(sample),
            ParsedSignal::Mood(report) => batch.mood = Some(report),
            ParsedSignal::Financial(report) => batch.financial = Some(report),
            ParsedSignal::SideEffect(report) => batch.side_effect = Some(report),
            ParsedSignal::MissedAppointments(count) => {
                batch.missed_appointments = Some(count)
            }
        }
    }
}

fn parse_metric(
    metric: &str,
    value: &str,
    observed_at: DateTime<Utc>,
) -> Result<ParsedSignal, String> {
    match metric.trim().to_ascii_lowercase().as_str() {
        "medication" | "appointment" | "communication" => {
            let percent: f64 = value
                .parse()
                .map_err(|_| format!("unparseable adherence value '{value}'"))?;
            let sample = AdherenceSample {
                percent,
                observed_at,
            };
            Ok(match metric.trim().to_ascii_lowercase().as_str() {
                "medication" => ParsedSignal::Medication(sample),
                "appointment" => ParsedSignal::Appointment(sample),
                _ => ParsedSignal::Communication(sample),
            })
        }
        "mood" => Ok(ParsedSignal::Mood(CategoryReport {
            category: value.to_string(),
            observed_at,
        })),
        "financial" => Ok(ParsedSignal::Financial(CategoryReport {
            category: value.to_string(),
            observed_at,
        })),
        "side_effect" => {
            let severity: u8 = value
                .parse()
                .map_err(|_| format!("unparseable side-effect severity '{value}'"))?;
            Ok(ParsedSignal::SideEffect(SideEffectReport {
                severity,
                observed_at,
            }))
        }
        "missed_appointments" => {
            let count: u32 = value
                .parse()
                .map_err(|_| format!("unparseable missed-appointment count '{value}'"))?;
            Ok(ParsedSignal::MissedAppointments(count))
        }
        other => Err(format!("unknown metric '{other}'")),
    }
}
