//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a mock catalog portal and run the
//! full cycle end-to-end: session handshake, catalog walk, extraction,
//! aggregation, storage and export.

mod portal;

use catalog_harvest::crawler::RunController;
use catalog_harvest::model::{FailureStage, Field, RunResult};
use catalog_harvest::output::{export_all, GroupingOptions, LecturerIndex};
use catalog_harvest::storage::{SqliteStorage, Storage, StoreOutcome};
use portal::{
    config, mount_catalog, mount_details, mount_handshake, start_portal, winter_2024,
    DetailPages, COURSES,
};
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn crawl(server: &MockServer, concurrency: u32) -> RunResult {
    RunController::new(config(&server.uri(), concurrency))
        .run_for(winter_2024())
        .await
        .expect("run should succeed")
}

fn ids(result: &RunResult) -> Vec<String> {
    result
        .records
        .iter()
        .map(|r| r.id.as_str().to_string())
        .collect()
}

fn expected_ids() -> Vec<String> {
    (1..=COURSES).map(|id| format!("V{}", id)).collect()
}

async fn start_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/start")
        .count()
}

#[tokio::test]
async fn test_full_crawl_in_discovery_order() {
    let server = start_portal().await;
    let result = crawl(&server, 1).await;

    assert_eq!(ids(&result), expected_ids());
    assert!(result.failures.is_empty());
    assert!(!result.stopped);
    // 5 listing pages; the backward "next" links are never followed
    assert_eq!(result.pages_visited, 5 + COURSES as u64);

    let first = &result.records[0];
    assert_eq!(first.title, "Kurs 1");
    assert_eq!(first.semester, winter_2024());
    assert_eq!(
        first.lecturer_names().collect::<Vec<_>>(),
        vec!["Eva Roth", "Prof. Dr. Hans Meier"]
    );
    assert_eq!(result.records[3].hours_per_week, Field::Known(1.5));
}

#[tokio::test]
async fn test_runs_are_deterministic() {
    let server = start_portal().await;

    let first = crawl(&server, 3).await;
    let second = crawl(&server, 3).await;
    assert_eq!(first.records, second.records);

    let export = |result: &RunResult| {
        let dir = TempDir::new().unwrap();
        let index = LecturerIndex::build(&result.records, GroupingOptions::default());
        let files = export_all(dir.path(), winter_2024(), &index).unwrap();
        let contents: Vec<(String, String)> = files
            .iter()
            .map(|p| {
                (
                    p.file_name().unwrap().to_string_lossy().into_owned(),
                    fs::read_to_string(p).unwrap(),
                )
            })
            .collect();
        contents
    };
    assert_eq!(export(&first), export(&second));
}

#[tokio::test]
async fn test_missing_title_skips_only_that_page() {
    let server = MockServer::start().await;
    mount_handshake(&server, vec!["T1"]).await;
    mount_catalog(&server).await;
    mount_details(&server, DetailPages::new().without_title(3)).await;

    let result = crawl(&server, 2).await;

    let mut expected = expected_ids();
    expected.retain(|id| id != "V3");
    assert_eq!(ids(&result), expected);
    assert_eq!(result.failure_count(), 1);
    assert_eq!(result.failures[0].stage, FailureStage::Extraction);
    assert!(result.failures[0].url.contains("publishid=3"));
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let server = MockServer::start().await;
    mount_handshake(&server, vec!["T1"]).await;
    mount_catalog(&server).await;
    Mock::given(path("/course"))
        .and(query_param("publishid", "5"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    mount_details(&server, DetailPages::new()).await;

    let result = crawl(&server, 2).await;

    assert_eq!(ids(&result), expected_ids());
    assert!(result.failures.is_empty());
}

#[tokio::test]
async fn test_session_expiry_mid_run_is_recovered() {
    let baseline = crawl(&start_portal().await, 2).await;

    let server = MockServer::start().await;
    mount_handshake(&server, vec!["T1", "T2"]).await;
    mount_catalog(&server).await;
    mount_details(&server, DetailPages::new().expiring("T1", 3)).await;

    let result = crawl(&server, 2).await;

    assert_eq!(result.records.len(), baseline.records.len());
    assert!(result.failures.is_empty());
    for (renewed, original) in result.records.iter().zip(&baseline.records) {
        assert!(renewed.same_content(original));
    }
    // Concurrent tasks noticing the same expiry renew only once
    assert_eq!(start_requests(&server).await, 2);
}

#[tokio::test]
async fn test_stop_signal_returns_partial_result() {
    let server = start_portal().await;

    let controller = RunController::new(config(&server.uri(), 1));
    let stop = controller.stop_signal();
    let controller = controller.with_progress(move |_| stop.stop());

    let result = controller.run_for(winter_2024()).await.unwrap();

    assert!(result.stopped);
    assert_eq!(ids(&result), vec!["V1".to_string()]);
}

#[tokio::test]
async fn test_store_and_export_end_to_end() {
    let server = start_portal().await;
    let result = crawl(&server, 2).await;

    let dir = TempDir::new().unwrap();
    let mut storage = SqliteStorage::new(&dir.path().join("catalog.db")).unwrap();
    assert_eq!(
        storage.store(winter_2024(), &result, "hash").unwrap(),
        StoreOutcome::Replaced { records: COURSES }
    );

    let loaded = storage.load(winter_2024()).unwrap();
    assert_eq!(loaded, result.records);

    let index = LecturerIndex::build(&loaded, GroupingOptions::default());
    assert_eq!(
        index.names().collect::<Vec<_>>(),
        vec!["Eva Roth", "Prof. Dr. Hans Meier"]
    );

    let export_dir = dir.path().join("exports");
    let files = export_all(&export_dir, winter_2024(), &index).unwrap();
    assert_eq!(files.len(), 2);

    let roth = fs::read_to_string(export_dir.join("2024w_Eva_Roth.md")).unwrap();
    assert!(roth.contains("| Kurs 1 | Vorlesung | 2 | Prof. Dr. Hans Meier |"));
    assert!(roth.contains("| Kurs 2 | Seminar | 2 | - |"));
}
