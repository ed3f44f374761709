use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::common::*;
use crate::engine::locks::PatientLocks;
use crate::engine::service::EngineServiceError;

#[test]
fn same_patient_contends_and_surfaces_a_retriable_error() {
    let locks = Arc::new(PatientLocks::new(Duration::from_millis(20)));
    let held = locks.acquire(&patient("p-1")).expect("first acquire");

    let contender = locks.clone();
    let result = thread::spawn(move || contender.acquire(&patient("p-1")))
        .join()
        .expect("thread joins");

    match result {
        Err(err) => assert_eq!(err.patient, "p-1"),
        Ok(_) => panic!("second acquire must time out while the lock is held"),
    }
    drop(held);
}

#[test]
fn different_patients_do_not_contend() {
    let locks = PatientLocks::new(Duration::from_millis(20));
    let _first = locks.acquire(&patient("p-1")).expect("first patient");
    let _second = locks.acquire(&patient("p-2")).expect("second patient");
}

#[test]
fn dropping_the_guard_releases_the_lock() {
    let locks = PatientLocks::new(Duration::from_millis(20));
    let guard = locks.acquire(&patient("p-1")).expect("first acquire");
    drop(guard);
    locks.acquire(&patient("p-1")).expect("re-acquire after drop");
}

#[test]
fn waiting_acquire_succeeds_once_the_holder_releases() {
    let locks = Arc::new(PatientLocks::new(Duration::from_millis(200)));
    let held = locks.acquire(&patient("p-1")).expect("first acquire");

    let contender = locks.clone();
    let waiter = thread::spawn(move || contender.acquire(&patient("p-1")));

    thread::sleep(Duration::from_millis(20));
    drop(held);

    waiter
        .join()
        .expect("thread joins")
        .expect("acquire succeeds within the wait bound");
}

#[test]
fn ingestion_for_independent_patients_runs_in_parallel_threads() {
    let (service, _repository, _feed) = build_service();
    let service = Arc::new(service);

    let mut handles = Vec::new();
    for index in 0..4 {
        let service = service.clone();
        handles.push(thread::spawn(move || {
            let id = format!("p-par-{index}");
            service.ingest(high_risk_batch(&id), now())
        }));
    }

    for handle in handles {
        handle
            .join()
            .expect("thread joins")
            .expect("each patient ingests cleanly");
    }

    let roster = service.roster(None).expect("roster");
    assert_eq!(roster.len(), 4);
}

#[test]
fn contention_error_maps_through_the_service_error_type() {
    let err = EngineServiceError::from(crate::engine::locks::ContentionError {
        patient: "p-9".to_string(),
    });
    assert!(err.to_string().contains("retry"));
}
