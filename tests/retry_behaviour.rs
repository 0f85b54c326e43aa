//! Retry-loop tests against a scripted transport on a paused clock.
//!
//! Time only moves when every task is waiting on a timer, so the gaps between recorded
//! dispatches are the backoff delays the client chose.

use async_trait::async_trait;
use http::{header::AUTHORIZATION, Method, StatusCode};
use pmo_client::transport::{Transport, TransportError, TransportRequest, TransportResponse};
use pmo_client::validate::{FieldKind, ObjectSchema};
use pmo_client::{Client, Error, RequestIdentity, RequestOptions, REQUEST_BUILD_CODE};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

type Reply = Result<TransportResponse, TransportError>;

struct Dispatch {
    at: Instant,
    request: TransportRequest,
}

/// Answers each dispatch with `respond(index)`, 0-based, and records what was sent.
struct ScriptedTransport {
    respond: Box<dyn Fn(usize) -> Reply + Send + Sync>,
    dispatches: Mutex<Vec<Dispatch>>,
}

impl ScriptedTransport {
    fn new(respond: impl Fn(usize) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            dispatches: Mutex::new(Vec::new()),
        })
    }

    fn count(&self) -> usize {
        self.dispatches.lock().unwrap().len()
    }

    /// Gaps between consecutive dispatches.
    fn gaps(&self) -> Vec<Duration> {
        let dispatches = self.dispatches.lock().unwrap();
        dispatches
            .windows(2)
            .map(|pair| pair[1].at.duration_since(pair[0].at))
            .collect()
    }

    fn authorization(&self) -> Vec<Option<String>> {
        self.dispatches
            .lock()
            .unwrap()
            .iter()
            .map(|d| {
                d.request
                    .headers
                    .get(AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned)
            })
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let index = {
            let mut dispatches = self.dispatches.lock().unwrap();
            dispatches.push(Dispatch {
                at: Instant::now(),
                request,
            });
            dispatches.len() - 1
        };
        (self.respond)(index)
    }
}

fn status(code: u16, body: &str) -> Reply {
    Ok(TransportResponse::new(
        StatusCode::from_u16(code).unwrap(),
        body.to_string(),
    ))
}

fn client_with(transport: Arc<ScriptedTransport>, max_retries: u32, base_delay_ms: u64) -> Client {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    Client::builder()
        .base_url("https://pmo.example.com/api")
        .unwrap()
        .max_retries(max_retries)
        .retry_base_delay(Duration::from_millis(base_delay_ms))
        .transport(transport)
        .build()
        .unwrap()
}

fn ms(values: &[u64]) -> Vec<Duration> {
    values.iter().map(|v| Duration::from_millis(*v)).collect()
}

fn assert_close(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual <= expected + Duration::from_millis(5),
        "expected ~{:?}, got {:?}",
        expected,
        actual
    );
}

fn assert_gaps(transport: &ScriptedTransport, expected: &[u64]) {
    let gaps = transport.gaps();
    assert_eq!(gaps.len(), expected.len(), "gaps: {:?}", gaps);
    for (gap, want) in gaps.into_iter().zip(ms(expected)) {
        assert_close(gap, want);
    }
}

fn projects_identity() -> RequestIdentity {
    RequestIdentity::new(&Method::GET, "/projects", &BTreeMap::new())
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_three_server_errors() {
    let transport = ScriptedTransport::new(|i| match i {
        0..=2 => status(500, "Server error"),
        _ => status(200, r#"[{"id":"PRJ-1"}]"#),
    });
    let client = client_with(transport.clone(), 3, 1000);

    let response = client
        .get::<Value>("/projects", RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(response.data, json!([{ "id": "PRJ-1" }]));
    assert_eq!(response.attempts, 4);
    assert_eq!(transport.count(), 4);
    assert_gaps(&transport, &[1000, 2000, 4000]);
    assert_close(response.latency, Duration::from_millis(7000));
    assert!(client.retry_ledger().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_bounded_retries_on_persistent_server_error() {
    for max_retries in [0u32, 1, 3, 5] {
        let transport = ScriptedTransport::new(|_| status(500, "Server error"));
        let client = client_with(transport.clone(), max_retries, 10);

        let err = client
            .get::<Value>("/projects", RequestOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Api { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(transport.count(), max_retries as usize + 1);
        assert!(client.retry_ledger().is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn test_success_after_transient_failures() {
    for failures in 0..=3usize {
        let transport =
            ScriptedTransport::new(move |i| if i < failures { status(503, "") } else { status(200, "{}") });
        let client = client_with(transport.clone(), 3, 10);

        let response = client
            .get::<Value>("/projects", RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(response.attempts, failures + 1);
        assert_eq!(transport.count(), failures + 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_backoff_doubles_per_retry() {
    let transport = ScriptedTransport::new(|_| status(502, "Bad gateway"));
    let client = client_with(transport.clone(), 5, 100);

    let _ = client.get::<Value>("/projects", RequestOptions::new()).await;

    assert_gaps(&transport, &[100, 200, 400, 800, 1600]);
}

#[tokio::test(start_paused = true)]
async fn test_client_error_is_immediate() {
    let transport = ScriptedTransport::new(|_| status(404, r#"{"detail":"Unknown project"}"#));
    let client = client_with(transport.clone(), 3, 1000);

    let err = client
        .get::<Value>("/projects/UNKNOWN", RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(err.message(), "Unknown project");
    assert_eq!(transport.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_not_retried() {
    let transport = ScriptedTransport::new(|_| Err(TransportError::timeout("operation timed out")));
    let client = client_with(transport.clone(), 3, 1000);

    let err = client
        .get::<Value>("/projects", RequestOptions::new())
        .await
        .unwrap_err();

    match err {
        Error::Network {
            is_retryable, code, ..
        } => {
            assert!(!is_retryable);
            assert_eq!(code.as_deref(), Some("timeout"));
        }
        other => panic!("Expected Network error, got {:?}", other),
    }
    assert_eq!(transport.count(), 1);
    assert!(client.retry_ledger().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_network_exhausts_retries() {
    let transport = ScriptedTransport::new(|_| Err(TransportError::connect("connection refused")));
    let client = client_with(transport.clone(), 3, 1000);

    let err = client
        .get::<Value>("/projects", RequestOptions::new())
        .await
        .unwrap_err();

    match err {
        Error::Network {
            is_retryable, code, ..
        } => {
            assert!(is_retryable);
            assert_eq!(code.as_deref(), Some("connect"));
        }
        other => panic!("Expected Network error, got {:?}", other),
    }
    assert_eq!(transport.count(), 4);
    assert_gaps(&transport, &[1000, 2000, 4000]);
    assert!(client.retry_ledger().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_schema_violation_is_never_retried() {
    let transport = ScriptedTransport::new(|_| status(201, r#"{"id":"PRJ-2","budget":"TBD"}"#));
    let client = client_with(transport.clone(), 10, 1000);

    let schema = ObjectSchema::new()
        .field("id", FieldKind::String)
        .field("budget", FieldKind::Number);

    let err = client
        .post_validated("/projects", &json!({ "budget": "TBD" }), &schema, RequestOptions::new())
        .await
        .unwrap_err();

    match err {
        Error::Validation { field, details, .. } => {
            assert_eq!(field.as_deref(), Some("budget"));
            assert_eq!(details.len(), 1);
        }
        other => panic!("Expected Validation error, got {:?}", other),
    }
    assert_eq!(transport.count(), 1);
    assert!(client.retry_ledger().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ledger_tracks_in_flight_retries() {
    let transport = ScriptedTransport::new(|i| match i {
        0 | 1 => status(500, ""),
        _ => status(200, "[]"),
    });
    let client = client_with(transport.clone(), 3, 1000);

    let request = {
        let client = client.clone();
        tokio::spawn(async move { client.get::<Value>("/projects", RequestOptions::new()).await })
    };

    // First failure at t=0, second at t=1000, success at t=3000.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(client.retry_ledger().get(&projects_identity()), Some(1));

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(client.retry_ledger().get(&projects_identity()), Some(2));

    let response = request.await.unwrap().unwrap();
    assert_eq!(response.attempts, 3);
    assert_eq!(client.retry_ledger().get(&projects_identity()), None);
}

#[tokio::test(start_paused = true)]
async fn test_identical_concurrent_requests_share_retry_budget() {
    let transport = ScriptedTransport::new(|_| status(500, ""));
    let client = client_with(transport.clone(), 1, 1000);
    let start = Instant::now();

    let first = async {
        let result = client.get::<Value>("/projects", RequestOptions::new()).await;
        (result, start.elapsed())
    };
    let second = async {
        let result = client.get::<Value>("/projects", RequestOptions::new()).await;
        (result, start.elapsed())
    };

    let ((first, first_elapsed), (second, second_elapsed)) = tokio::join!(first, second);

    assert!(first.unwrap_err().is_api());
    assert!(second.unwrap_err().is_api());

    // The second request finds the budget already spent by the first and gives up at once.
    // Its terminal clear then resets the first request's count, granting it an extra retry.
    assert_close(second_elapsed, Duration::ZERO);
    assert_close(first_elapsed, Duration::from_millis(2000));
    assert_eq!(transport.count(), 4);
    assert!(client.retry_ledger().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_isolated_accounting_gives_each_call_its_own_budget() {
    let transport = ScriptedTransport::new(|_| status(500, ""));
    let client = Client::builder()
        .base_url("https://pmo.example.com/api")
        .unwrap()
        .max_retries(1)
        .retry_base_delay(Duration::from_millis(1000))
        .isolate_retry_accounting(true)
        .transport(transport.clone())
        .build()
        .unwrap();
    let start = Instant::now();

    let first = async {
        let result = client.get::<Value>("/projects", RequestOptions::new()).await;
        (result, start.elapsed())
    };
    let second = async {
        let result = client.get::<Value>("/projects", RequestOptions::new()).await;
        (result, start.elapsed())
    };

    let ((first, first_elapsed), (second, second_elapsed)) = tokio::join!(first, second);

    assert!(first.is_err() && second.is_err());
    assert_close(first_elapsed, Duration::from_millis(1000));
    assert_close(second_elapsed, Duration::from_millis(1000));
    assert_eq!(transport.count(), 4);
    assert!(client.retry_ledger().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_separate_clients_do_not_share_ledgers() {
    let transport = ScriptedTransport::new(|_| status(500, ""));
    let a = client_with(transport.clone(), 1, 1000);
    let b = client_with(transport.clone(), 1, 1000);

    let (ra, rb) = tokio::join!(
        a.get::<Value>("/projects", RequestOptions::new()),
        b.get::<Value>("/projects", RequestOptions::new())
    );

    assert!(ra.is_err() && rb.is_err());
    assert_eq!(transport.count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_credential_update_applies_to_next_attempt() {
    let transport = ScriptedTransport::new(|i| if i == 0 { status(500, "") } else { status(200, "{}") });
    let client = Client::builder()
        .base_url("https://pmo.example.com/api")
        .unwrap()
        .credential("old-token")
        .transport(transport.clone())
        .build()
        .unwrap();

    let request = {
        let client = client.clone();
        tokio::spawn(async move { client.get::<Value>("/projects", RequestOptions::new()).await })
    };

    tokio::time::sleep(Duration::from_millis(500)).await;
    client.set_credential(Some("new-token".to_string()));

    request.await.unwrap().unwrap();

    assert_eq!(
        transport.authorization(),
        vec![
            Some("Bearer old-token".to_string()),
            Some("Bearer new-token".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_reuses_request_parameters() {
    let transport = ScriptedTransport::new(|i| if i == 0 { status(503, "") } else { status(200, "{}") });
    let client = client_with(transport.clone(), 3, 10);

    let options = RequestOptions::new()
        .with_query_param("status", "open")
        .with_header("x-request-source", "raid-board")
        .unwrap()
        .with_timeout(Duration::from_secs(2));

    client
        .patch::<_, Value>("/raid/issues/I-4", &json!({ "owner": "ops" }), options)
        .await
        .unwrap();

    let dispatches = transport.dispatches.lock().unwrap();
    assert_eq!(dispatches.len(), 2);
    for dispatch in dispatches.iter() {
        let request = &dispatch.request;
        assert_eq!(request.method, Method::PATCH);
        assert_eq!(
            request.url.as_str(),
            "https://pmo.example.com/api/raid/issues/I-4?status=open"
        );
        assert_eq!(request.headers.get("x-request-source").unwrap(), "raid-board");
        assert_eq!(request.body, Some(json!({ "owner": "ops" })));
        assert_eq!(request.timeout, Some(Duration::from_secs(2)));
    }
}

#[tokio::test(start_paused = true)]
async fn test_unserializable_body_is_never_dispatched() {
    let transport = ScriptedTransport::new(|_| status(200, "{}"));
    let client = client_with(transport.clone(), 3, 10);

    // Maps with non-string keys cannot be represented as JSON objects.
    let mut body = HashMap::new();
    body.insert((1u8, 2u8), "cell");

    let err = client
        .post::<_, Value>("/projects", &body, RequestOptions::new())
        .await
        .unwrap_err();

    match err {
        Error::Network {
            is_retryable, code, ..
        } => {
            assert!(!is_retryable);
            assert_eq!(code.as_deref(), Some(REQUEST_BUILD_CODE));
        }
        other => panic!("Expected Network error, got {:?}", other),
    }
    assert_eq!(transport.count(), 0);
    assert!(client.retry_ledger().is_empty());
}
