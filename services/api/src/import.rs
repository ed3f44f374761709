use crate::infra::{default_engine_settings, InMemoryAlertFeed, InMemoryEngineRepository};
use adhera::engine::import::parse_batches;
use adhera::engine::RiskEngineService;
use adhera::error::AppError;
use chrono::Utc;
use clap::Args;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// CSV signal export with patient_id,metric,value,observed_at columns
    #[arg(long)]
    pub(crate) file: PathBuf,
}

/// Offline scoring pass over an exported signal file: validates the rows,
/// runs every batch through the engine, and prints the resulting roster.
pub(crate) fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let now = Utc::now();
    let file = File::open(&args.file)?;
    let parsed = parse_batches(file, now).map_err(AppError::from)?;

    println!(
        "Parsed {} row(s) into {} patient batch(es)",
        parsed.rows,
        parsed.batches.len()
    );
    if !parsed.skipped.is_empty() {
        println!("Skipped rows");
        for skip in &parsed.skipped {
            println!("- row {}: {}", skip.row, skip.reason);
        }
    }

    let repository = Arc::new(InMemoryEngineRepository::default());
    let feed = Arc::new(InMemoryAlertFeed::default());
    let service = RiskEngineService::new(repository, feed, default_engine_settings());

    let mut rejected = 0usize;
    for batch in parsed.batches {
        let patient_id = batch.patient_id.0.clone();
        if let Err(err) = service.ingest(batch, now) {
            rejected += 1;
            println!("- {patient_id}: rejected ({err})");
        }
    }

    let roster = match service.roster(None) {
        Ok(roster) => roster,
        Err(err) => {
            println!("Roster unavailable: {err}");
            return Ok(());
        }
    };

    println!("\nScored roster ({} rejected)", rejected);
    for profile in &roster {
        println!(
            "- {} | score {} | tier {} | primary {}",
            profile.patient_id.0,
            profile.composite_score,
            profile.tier.label(),
            profile.primary_factor.label()
        );
    }

    Ok(())
}
