use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use super::profile::PatientId;

const RETRY_INTERVAL: Duration = Duration::from_millis(2);

/// Lock acquisition timed out. Retriable: the holder is another operation on
/// the same patient and will release shortly.
#[derive(Debug, thiserror::Error, PartialEq)]
#[error("patient {patient} is locked by a concurrent operation; retry")]
pub struct ContentionError {
    pub patient: String,
}

/// Registry of exclusive per-patient locks. Different patients never contend;
/// operations on the same patient serialize, with a bounded wait before a
/// `ContentionError` surfaces.
pub struct PatientLocks {
    slots: Mutex<HashMap<PatientId, Arc<AtomicBool>>>,
    wait: Duration,
}

impl PatientLocks {
    pub fn new(wait: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            wait,
        }
    }

    fn slot(&self, patient: &PatientId) -> Arc<AtomicBool> {
        let mut slots = self.slots.lock().expect("lock registry mutex poisoned");
        slots
            .entry(patient.clone())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone()
    }

    /// Acquire the patient's exclusive lock, waiting up to the configured
    /// bound. The guard releases on drop.
    pub fn acquire(&self, patient: &PatientId) -> Result<PatientGuard, ContentionError> {
        let slot = self.slot(patient);
        let deadline = Instant::now() + self.wait;

        loop {
            if slot
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return Ok(PatientGuard { slot });
            }
            if Instant::now() >= deadline {
                return Err(ContentionError {
                    patient: patient.0.clone(),
                });
            }
            thread::sleep(RETRY_INTERVAL);
        }
    }
}

/// Exclusive hold on one patient's state. Dropping releases the lock.
pub struct PatientGuard {
    slot: Arc<AtomicBool>,
}

impl Drop for PatientGuard {
    fn drop(&mut self) {
        self.slot.store(false, Ordering::Release);
    }
}
