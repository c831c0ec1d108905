//! Batch driver tests against an in-memory backend

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use test_log::test;

use crate::common::fakes::{build_driver, Attempt, FakeBackend, RecordingPacer};
use crate::common::logging::{init_test_logging, log_test_data, log_test_step};
use crate::common::test_data::{create_test_config, id_set};
use statement_crawler::batch_driver::RunSummary;
use statement_crawler::models::{CompanyType, Season};

const PACE: Duration = Duration::from_secs(3);
const COOLDOWN: Duration = Duration::from_secs(90);

fn sii_backend(ids: &[u32]) -> FakeBackend {
    FakeBackend::new().with_listing(CompanyType::Sii, ids)
}

#[test(tokio::test)]
async fn test_fresh_period_crawls_every_listed_company() {
    init_test_logging();
    log_test_step("Fresh period bypasses the validity list");

    let backend = Arc::new(sii_backend(&[1101, 1102]).with_valid(id_set(&["1102"])));
    let pacer = Arc::new(RecordingPacer::default());
    let driver = build_driver(backend.clone(), pacer.clone(), create_test_config());

    let summary = driver.run(2019, Season::Q2).await.unwrap();
    log_test_data("Run summary", &summary);

    assert_eq!(backend.attempts(), vec![1101, 1102]);
    assert_eq!(
        summary,
        RunSummary {
            worklist: 2,
            succeeded: 2,
            recovered: 0,
            abandoned: vec![],
        }
    );
    assert_eq!(pacer.waits(), vec![PACE, PACE]);
}

#[test(tokio::test)]
async fn test_already_stored_company_is_not_crawled() {
    let backend = Arc::new(
        sii_backend(&[1101, 1102])
            .with_updated(id_set(&["1101"]))
            .with_valid(id_set(&["1102"])),
    );
    let driver = build_driver(backend.clone(), Arc::new(RecordingPacer::default()), create_test_config());

    driver.run(2019, Season::Q2).await.unwrap();

    assert_eq!(backend.attempts(), vec![1102]);
    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].0, 1102);
    assert_eq!(submissions[0].1.year, 2019);
    assert_eq!(submissions[0].1.season, "2");
}

#[test(tokio::test)]
async fn test_persistent_failure_is_abandoned_after_three_retries() {
    let backend = Arc::new(sii_backend(&[1101]).with_script(
        1101,
        &[
            Attempt::Rejected(500),
            Attempt::Rejected(500),
            Attempt::Rejected(500),
            Attempt::Rejected(500),
            Attempt::Rejected(500),
        ],
    ));
    let pacer = Arc::new(RecordingPacer::default());
    let driver = build_driver(backend.clone(), pacer.clone(), create_test_config());

    let summary = driver.run(2019, Season::Q2).await.unwrap();

    // initial attempt plus three retries, never a fourth retry
    assert_eq!(backend.attempts_for(1101), 4);
    assert_eq!(summary.abandoned, vec![1101]);
    assert_eq!(summary.recovered, 0);
    assert_eq!(pacer.waits(), vec![PACE; 4]);
}

#[test(tokio::test)]
async fn test_success_on_any_retry_stops_retrying() {
    for failures in 1..=3 {
        let script = vec![Attempt::Rejected(500); failures];
        let backend = Arc::new(sii_backend(&[2330]).with_script(2330, &script));
        let driver = build_driver(backend.clone(), Arc::new(RecordingPacer::default()), create_test_config());

        let summary = driver.run(2019, Season::Q1).await.unwrap();

        assert_eq!(backend.attempts_for(2330), failures + 1);
        assert_eq!(summary.recovered, 1);
        assert!(summary.abandoned.is_empty());
    }
}

#[test(tokio::test)]
async fn test_retry_queue_is_round_robin() {
    let backend = Arc::new(
        sii_backend(&[1101, 1102, 1103])
            .with_script(1101, &[Attempt::Rejected(500), Attempt::Rejected(500)])
            .with_script(1102, &[Attempt::ConnectionError]),
    );
    let driver = build_driver(backend.clone(), Arc::new(RecordingPacer::default()), create_test_config());

    let summary = driver.run(2019, Season::Q3).await.unwrap();

    assert_eq!(backend.attempts(), vec![1101, 1102, 1103, 1101, 1102, 1101]);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.recovered, 2);
}

#[test(tokio::test)]
async fn test_rejected_submission_is_enqueued_for_retry() {
    let backend = Arc::new(sii_backend(&[2330]).with_script(2330, &[Attempt::Rejected(500)]));
    let driver = build_driver(backend.clone(), Arc::new(RecordingPacer::default()), create_test_config());

    let summary = driver.run(2019, Season::Q4).await.unwrap();

    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.recovered, 1);
    assert_eq!(backend.submissions().len(), 2);
}

#[test(tokio::test)]
async fn test_index_error_triggers_cooldown() {
    let backend = Arc::new(
        sii_backend(&[1101, 1102]).with_script(1101, &[Attempt::IndexError, Attempt::IndexError]),
    );
    let pacer = Arc::new(RecordingPacer::default());
    let driver = build_driver(backend.clone(), pacer.clone(), create_test_config());

    let summary = driver.run(2019, Season::Q2).await.unwrap();

    // cooldown only in the first pass; retries are paced but never cooled down
    assert_eq!(pacer.waits(), vec![COOLDOWN, PACE, PACE, PACE, PACE]);
    assert_eq!(backend.attempts(), vec![1101, 1102, 1101, 1101]);
    assert_eq!(summary.recovered, 1);
}

#[test(tokio::test)]
async fn test_connection_error_does_not_cool_down() {
    let backend = Arc::new(sii_backend(&[1101]).with_script(1101, &[Attempt::ConnectionError]));
    let pacer = Arc::new(RecordingPacer::default());
    let driver = build_driver(backend.clone(), pacer.clone(), create_test_config());

    driver.run(2019, Season::Q2).await.unwrap();

    assert_eq!(pacer.waits(), vec![PACE, PACE]);
}

#[test(tokio::test)]
async fn test_nothing_published_means_nothing_crawled() {
    let backend = Arc::new(FakeBackend::new());
    let pacer = Arc::new(RecordingPacer::default());
    let driver = build_driver(backend.clone(), pacer.clone(), create_test_config());

    let summary = driver.run(2019, Season::Q2).await.unwrap();

    assert_eq!(summary, RunSummary::default());
    assert!(backend.attempts().is_empty());
    assert!(pacer.waits().is_empty());
}
