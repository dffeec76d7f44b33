//! End-to-end crawl scenarios against a mock CircleCI API.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use cistream::auth::Token;
use cistream::client::{ApiRoutes, CircleCiClient};
use cistream::config::{CircleCiConfig, CrawlConfig};
use cistream::crawl::{Crawler, LeafRecord};
use cistream::error::{CiStreamError, Result};
use cistream::progress::NoopProgress;
use cistream::sink::RecordSink;

/// Sink collecting records in memory, optionally cancelling the crawl
/// after a number of writes.
#[derive(Clone)]
struct CollectingSink {
    records: Arc<Mutex<Vec<LeafRecord>>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl CollectingSink {
    fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            cancel_after: None,
        }
    }

    fn cancelling_after(writes: usize, token: CancellationToken) -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            cancel_after: Some((writes, token)),
        }
    }

    fn records(&self) -> Vec<LeafRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl RecordSink for CollectingSink {
    fn write(&mut self, record: &LeafRecord) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        records.push(record.clone());
        if let Some((after, token)) = &self.cancel_after {
            if records.len() >= *after {
                token.cancel();
            }
        }
        Ok(())
    }
}

fn crawl_config() -> CrawlConfig {
    CrawlConfig {
        max_attempts: 2,
        retry_delay_ms: 1,
        concurrency: 4,
        ..CrawlConfig::default()
    }
}

fn crawler_for(server: &mockito::Server) -> Crawler {
    let circleci = CircleCiConfig {
        api_base_url: server.url(),
        api_v1_base_url: server.url(),
        ..CircleCiConfig::default()
    };
    let config = crawl_config();
    let client = Arc::new(CircleCiClient::new(Some(&Token::from("t")), &config).unwrap());
    let routes = ApiRoutes::new(&circleci, "acme", "widgets").unwrap();
    Crawler::new(client, routes, config, Arc::new(NoopProgress))
}

const DETAIL_BODY: &str = r#"{
    "lifecycle": "finished",
    "build_time_millis": 420000,
    "workflows": {"job_name": "build", "job_id": "wf-job-1"},
    "build_url": "https://circleci.com/gh/acme/widgets/7",
    "steps": [
        {"name": "Checkout", "actions": [
            {"name": "checkout", "status": "success", "run_time_millis": 1200}
        ]},
        {"name": "Test", "actions": [
            {"name": "cargo test", "status": "success", "run_time_millis": 400000}
        ]}
    ]
}"#;

async fn mount_happy_path(server: &mut mockito::Server) {
    server
        .mock("GET", "/project/github/acme/widgets/pipeline")
        .with_body(r#"{"items":[{"id":"pipe-1"}],"next_page_token":null}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/pipeline/pipe-1/workflow")
        .with_body(r#"{"items":[{"id":"wf-1"}],"next_page_token":null}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/workflow/wf-1/job")
        .with_body(
            r#"{"items":[{"job_number":7,"name":"build"},{"name":"hold","type":"approval"}],"next_page_token":null}"#,
        )
        .create_async()
        .await;
    server
        .mock("GET", "/project/github/acme/widgets/7")
        .with_body(DETAIL_BODY)
        .create_async()
        .await;
}

#[tokio::test]
async fn full_hierarchy_flattens_into_two_records() {
    let mut server = mockito::Server::new_async().await;
    mount_happy_path(&mut server).await;

    let crawler = crawler_for(&server);
    let sink = CollectingSink::new();
    let report = crawler
        .run(Some(1000), Box::new(sink.clone()))
        .await
        .unwrap();

    assert_eq!(report.pipelines, 1);
    assert_eq!(report.workflows, 1);
    assert_eq!(report.jobs, 2);
    assert_eq!(report.skipped_jobs, 1, "the approval job expands to nothing");
    assert_eq!(report.records, 2);

    let records = sink.records();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.build_url, "https://circleci.com/gh/acme/widgets/7");
        assert_eq!(record.workflow_job_id, "wf-job-1");
        assert_eq!(record.lifecycle, "finished");
        assert_eq!(record.total, Some(420000));
    }
    let mut actions: Vec<&str> = records.iter().map(|r| r.action_name.as_str()).collect();
    actions.sort_unstable();
    assert_eq!(actions, ["cargo test", "checkout"]);
}

#[tokio::test]
async fn pipeline_limit_bounds_the_whole_crawl() {
    let mut server = mockito::Server::new_async().await;
    // Two pipelines on the first page, a further page that must never be
    // requested once the limit is satisfied.
    server
        .mock("GET", "/project/github/acme/widgets/pipeline")
        .with_body(r#"{"items":[{"id":"pipe-1"},{"id":"pipe-2"}],"next_page_token":"more"}"#)
        .create_async()
        .await;
    let next_page = server
        .mock("GET", "/project/github/acme/widgets/pipeline")
        .match_query(mockito::Matcher::UrlEncoded(
            "page-token".into(),
            "more".into(),
        ))
        .expect(0)
        .create_async()
        .await;
    for pipeline in ["pipe-1", "pipe-2"] {
        server
            .mock("GET", format!("/pipeline/{pipeline}/workflow").as_str())
            .with_body(r#"{"items":[],"next_page_token":null}"#)
            .create_async()
            .await;
    }

    let crawler = crawler_for(&server);
    let sink = CollectingSink::new();
    let report = crawler.run(Some(2), Box::new(sink.clone())).await.unwrap();

    assert_eq!(report.pipelines, 2);
    assert_eq!(report.records, 0);
    next_page.assert_async().await;
}

#[tokio::test]
async fn cancelled_before_start_issues_no_requests() {
    let mut server = mockito::Server::new_async().await;
    let pipelines = server
        .mock("GET", "/project/github/acme/widgets/pipeline")
        .expect(0)
        .create_async()
        .await;

    let crawler = crawler_for(&server);
    crawler.cancel_token().cancel();

    let sink = CollectingSink::new();
    let result = crawler.run(Some(10), Box::new(sink.clone())).await;

    assert!(matches!(result, Err(CiStreamError::Interrupted)));
    assert!(sink.records().is_empty());
    pipelines.assert_async().await;
}

#[tokio::test]
async fn cancelling_mid_crawl_stops_further_writes() {
    let mut server = mockito::Server::new_async().await;
    mount_happy_path(&mut server).await;

    let crawler = crawler_for(&server);
    let sink = CollectingSink::cancelling_after(1, crawler.cancel_token());

    let result = crawler.run(Some(1000), Box::new(sink.clone())).await;

    assert!(matches!(result, Err(CiStreamError::Interrupted)));
    assert_eq!(
        sink.records().len(),
        1,
        "no further writes once cancellation is observed"
    );
}

#[tokio::test]
async fn detail_fetch_failure_aborts_the_crawl_with_the_real_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/project/github/acme/widgets/pipeline")
        .with_body(r#"{"items":[{"id":"pipe-1"}],"next_page_token":null}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/pipeline/pipe-1/workflow")
        .with_body(r#"{"items":[{"id":"wf-1"}],"next_page_token":null}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/workflow/wf-1/job")
        .with_body(r#"{"items":[{"job_number":7,"name":"build"}],"next_page_token":null}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/project/github/acme/widgets/7")
        .with_status(500)
        .expect(2)
        .create_async()
        .await;

    let crawler = crawler_for(&server);
    let sink = CollectingSink::new();
    let result = crawler.run(Some(1000), Box::new(sink.clone())).await;

    match result {
        Err(CiStreamError::Transport { attempts, .. }) => assert_eq!(attempts, 2),
        other => panic!("expected Transport error, got {other:?}"),
    }
    assert!(sink.records().is_empty());
}
