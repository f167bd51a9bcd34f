//! Client, pagination and rule push against a mock console

use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cwp_report::rules::{build_policy, decode_profiles, push_policy};
use cwp_report::sink::Sink;
use cwp_report::{
    ConsoleClient, ConsoleConfig, Error, PersistReceipt, Report, ReportKind, ReportPipeline,
};

const TOKEN: &str = "dXNlcjpwYXNz";
const RUNTIME_PATH: &str = "/api/v1/audits/runtime/container";
const WAAS_PATH: &str = "/api/v33.01/audits/firewall/app/container";

#[derive(Default)]
struct Collect(Vec<Report>);

impl Sink for Collect {
    fn persist(&mut self, report: &Report) -> cwp_report::Result<PersistReceipt> {
        self.0.push(report.clone());
        Ok(PersistReceipt { path: None, rows: report.len() })
    }
}

fn config(server: &MockServer) -> ConsoleConfig {
    let mut config = ConsoleConfig::new(server.uri(), TOKEN);
    config.page_size = 2;
    config.backoff_base = Duration::from_millis(1);
    config
}

fn runtime_event(msg: &str) -> serde_json::Value {
    json!({
        "containerName": "api",
        "time": "2024-03-05T10:15:30Z",
        "port": 8080,
        "msg": msg,
    })
}

async fn mount_page(server: &MockServer, offset: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(RUNTIME_PATH))
        .and(query_param("limit", "2"))
        .and(query_param("offset", offset))
        .and(header("authorization", format!("Basic {}", TOKEN).as_str()))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_pages_until_empty() {
    let server = MockServer::start().await;
    mount_page(&server, "0", json!([runtime_event("a"), runtime_event("b")])).await;
    mount_page(&server, "2", json!([runtime_event("c")])).await;
    mount_page(&server, "4", json!([])).await;

    let pipeline = ReportPipeline::new(config(&server)).unwrap();
    let outcome = pipeline.fetch(ReportKind::Runtime).await.unwrap();

    assert_eq!(outcome.events.len(), 3);
    assert_eq!(outcome.requests, 3);
    assert_eq!(outcome.retries, 0);
    assert_eq!(outcome.events[2]["msg"], "c");
}

#[tokio::test]
async fn test_null_page_ends_session() {
    let server = MockServer::start().await;
    mount_page(&server, "0", json!([runtime_event("a")])).await;
    Mock::given(method("GET"))
        .and(path(RUNTIME_PATH))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .mount(&server)
        .await;

    let pipeline = ReportPipeline::new(config(&server)).unwrap();
    let mut sink = Collect::default();
    let summary = pipeline.run(ReportKind::Runtime, &mut sink).await.unwrap();

    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.normalized, 1);
    let Report::Runtime(records) = &sink.0[0] else {
        panic!("expected a runtime report");
    };
    assert_eq!(records[0].time, "Tuesday, 05 March 2024 17:15:30");
}

#[tokio::test]
async fn test_recovers_from_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RUNTIME_PATH))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_page(&server, "0", json!([runtime_event("a")])).await;
    mount_page(&server, "2", json!([])).await;

    let pipeline = ReportPipeline::new(config(&server)).unwrap();
    let outcome = pipeline.fetch(ReportKind::Runtime).await.unwrap();

    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.retries, 2);
    assert_eq!(outcome.requests, 4);
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RUNTIME_PATH))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&server)
        .await;

    let mut config = config(&server);
    config.max_attempts = 3;
    let pipeline = ReportPipeline::new(config).unwrap();
    let mut sink = Collect::default();
    let err = pipeline.run(ReportKind::Runtime, &mut sink).await.unwrap_err();

    assert!(matches!(err, Error::RateLimited { offset: 0, attempts: 3, status: 429 }));
    assert!(sink.0.is_empty());
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = ReportPipeline::new(config(&server)).unwrap();
    let err = pipeline.fetch(ReportKind::Waas).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_failed_kind_does_not_stop_the_others() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WAAS_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "0", json!([runtime_event("Reverse shell detected")])).await;
    mount_page(&server, "2", json!([])).await;

    let pipeline = ReportPipeline::new(config(&server)).unwrap();
    let mut sink = Collect::default();
    let outcomes = pipeline
        .run_all(&[ReportKind::Waas, ReportKind::Runtime], &mut sink)
        .await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].kind, ReportKind::Waas);
    assert!(matches!(outcomes[0].result, Err(Error::RequestFailed { status: 401, offset: 0 })));
    assert_eq!(outcomes[1].kind, ReportKind::Runtime);
    assert_eq!(outcomes[1].result.as_ref().unwrap().normalized, 1);

    assert_eq!(sink.0.len(), 1);
    let Report::Runtime(records) = &sink.0[0] else {
        panic!("expected a runtime report");
    };
    assert_eq!(records[0].message, "Reverse shell detected");
}

#[tokio::test]
async fn test_push_rules() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v33.01/collections"))
        .respond_with(ResponseTemplate::new(409).set_body_string("collection already exists"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v33.01/collections"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/policies/runtime/container"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = config(&server);
    let client = ConsoleClient::new(&config).unwrap();
    let raw = [json!({ "image": "nginx:1.25" }), json!({ "image": "redis:7" })];
    let profiles = decode_profiles(&raw).unwrap();
    let policy = build_policy(&profiles, "secops", Utc::now());

    let summary = push_policy(&client, &config, &policy).await.unwrap();
    assert_eq!(summary.collections_existing, 1);
    assert_eq!(summary.collections_created, 1);
    assert_eq!(summary.rules, 2);

    let requests = server.received_requests().await.unwrap();
    let put = requests.iter().find(|r| r.method.as_str() == "PUT").unwrap();
    let body: serde_json::Value = serde_json::from_slice(&put.body).unwrap();
    assert_eq!(body["rules"][0]["name"], "Runtime Rule for nginx:1-25");
    assert_eq!(body["rules"][1]["owner"], "secops");
}

#[tokio::test]
async fn test_rejected_policy_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let config = config(&server);
    let client = ConsoleClient::new(&config).unwrap();
    let profiles = decode_profiles(&[json!({ "image": "nginx" })]).unwrap();
    let policy = build_policy(&profiles, "", Utc::now());

    let err = push_policy(&client, &config, &policy).await.unwrap_err();
    assert!(matches!(err, Error::PolicyRejected { status: 400 }));
}
