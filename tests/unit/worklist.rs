//! Worklist selection tests

use pretty_assertions::assert_eq;
use std::sync::Arc;
use test_log::test;

use crate::common::fakes::{build_driver, FakeBackend, RecordingPacer};
use crate::common::test_data::{create_test_config, id_set};
use statement_crawler::batch_driver::select_targets;
use statement_crawler::models::{CompanyType, Season};

#[test]
fn test_fresh_period_takes_every_listed_id() {
    // nothing stored yet: validity list is not consulted
    let targets = select_targets(&[1101, 1102], &id_set(&[]), &id_set(&["1102"]));
    assert_eq!(targets, vec![1101, 1102]);
}

#[test]
fn test_stored_ids_are_skipped() {
    let targets = select_targets(&[1101, 1102], &id_set(&["1101"]), &id_set(&["1102"]));
    assert_eq!(targets, vec![1102]);
}

#[test]
fn test_ids_missing_from_both_sets_are_excluded() {
    let targets = select_targets(
        &[1101, 1102, 1103],
        &id_set(&["2330"]),
        &id_set(&["1101", "1102"]),
    );
    assert_eq!(targets, vec![1101, 1102]);
    assert!(!targets.contains(&1103));
}

#[test]
fn test_listing_order_is_kept() {
    let targets = select_targets(&[2330, 1101, 2317], &id_set(&["9999"]), &id_set(&["2317", "2330", "1101"]));
    assert_eq!(targets, vec![2330, 1101, 2317]);
}

#[test(tokio::test)]
async fn test_partitions_are_concatenated_in_order() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_listing(CompanyType::Sii, &[1101, 1102])
            .with_listing(CompanyType::Otc, &[6488, 1101])
            .with_updated(id_set(&["1102"]))
            .with_valid(id_set(&["1101", "1102", "6488"])),
    );
    let driver = build_driver(backend, Arc::new(RecordingPacer::default()), create_test_config());

    let worklist = driver.build_worklist(2019, Season::Q2).await.unwrap();

    assert_eq!(worklist, vec![1101, 6488, 1101]);
}

#[test(tokio::test)]
async fn test_empty_partition_is_skipped() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_listing(CompanyType::Sii, &[])
            .with_listing(CompanyType::Otc, &[6488]),
    );
    let driver = build_driver(backend, Arc::new(RecordingPacer::default()), create_test_config());

    let worklist = driver.build_worklist(2019, Season::Q2).await.unwrap();

    assert_eq!(worklist, vec![6488]);
}

#[test(tokio::test)]
async fn test_listing_failure_is_reported() {
    let backend = Arc::new(FakeBackend::new().with_failing_listing());
    let driver = build_driver(backend, Arc::new(RecordingPacer::default()), create_test_config());

    let result = driver.build_worklist(2019, Season::Q2).await;

    assert!(result.is_err());
}
