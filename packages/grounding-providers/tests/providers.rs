use std::{
	future::IntoFuture,
	sync::{
		Arc, Mutex,
		atomic::{AtomicU32, AtomicUsize, Ordering},
	},
	time::{Duration, Instant},
};

use axum::{
	Json, Router,
	extract::{RawQuery, State},
	http::{HeaderMap, StatusCode},
	response::IntoResponse,
	routing,
};
use reqwest::header::AUTHORIZATION;
use tokio::{
	net::TcpListener,
	sync::{oneshot, oneshot::Sender},
};

use grounding_config::Upstream;
use grounding_domain::SourceFailureReason;
use grounding_providers::search::{AgentSearchClient, SearchRequest};

const SEARCH_PATH: &str = "/agent/v1/products/search";

#[derive(Clone, Copy)]
enum Behavior {
	Ok,
	FailFirst(u16),
	AlwaysStatus(u16),
	Slow,
	FailFirstThenSlow(u16),
}

#[derive(Clone)]
struct StubState {
	behavior: Behavior,
	calls: Arc<AtomicUsize>,
	seen: Arc<Mutex<Vec<(Option<String>, HeaderMap)>>>,
}

async fn start_search_server(behavior: Behavior) -> (String, StubState, Sender<()>) {
	let state = StubState {
		behavior,
		calls: Arc::new(AtomicUsize::new(0)),
		seen: Arc::new(Mutex::new(Vec::new())),
	};
	let app = Router::new()
		.route(SEARCH_PATH, routing::get(search_handler))
		.with_state(state.clone());
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind search server.");
	let addr = listener.local_addr().expect("Failed to read search server address.");
	let (tx, rx) = oneshot::channel();
	let server = axum::serve(listener, app).with_graceful_shutdown(async move {
		let _ = rx.await;
	});

	tokio::spawn(async move {
		let _ = server.into_future().await;
	});

	(format!("http://{addr}"), state, tx)
}

async fn search_handler(
	State(state): State<StubState>,
	RawQuery(query): RawQuery,
	headers: HeaderMap,
) -> impl IntoResponse {
	let call_index = state.calls.fetch_add(1, Ordering::SeqCst);

	state.seen.lock().unwrap_or_else(|err| err.into_inner()).push((query, headers));

	match state.behavior {
		Behavior::FailFirst(status) | Behavior::FailFirstThenSlow(status) if call_index == 0 =>
			return StatusCode::from_u16(status)
				.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
				.into_response(),
		Behavior::AlwaysStatus(status) =>
			return StatusCode::from_u16(status)
				.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
				.into_response(),
		Behavior::Slow | Behavior::FailFirstThenSlow(_) =>
			tokio::time::sleep(Duration::from_millis(800)).await,
		_ => {},
	}

	let body = serde_json::json!({
		"data": {
			"items": [
				{
					"product_id": "p1",
					"merchant_id": "m1",
					"title": "Winona Soothing Moisturizer 50g",
					"vendor": "Winona",
				}
			]
		}
	});

	(StatusCode::OK, Json(body)).into_response()
}

fn upstream(api_base: &str) -> Upstream {
	Upstream {
		api_base: Some(api_base.to_string()),
		search_path: SEARCH_PATH.to_string(),
		api_key: Some("secret".to_string()),
		checkout_token: None,
		retries: 1,
		retry_backoff_ms: 10,
	}
}

fn request<'a>(merchant_ids: &'a [String], retries: u32, timeout_ms: u64) -> SearchRequest<'a> {
	SearchRequest {
		query: "winona moisturizer",
		merchant_ids,
		search_all_merchants: merchant_ids.is_empty(),
		limit: 20,
		timeout_ms,
		retries,
		retry_backoff_ms: 10,
		checkout_token: None,
		attempts_sent: None,
	}
}

#[test]
fn api_key_sends_both_key_headers() {
	let headers =
		grounding_providers::auth_headers(Some("secret"), None).expect("Failed to build headers.");

	assert_eq!(headers.get(AUTHORIZATION).expect("Missing authorization header."), "Bearer secret");
	assert_eq!(headers.get("x-api-key").expect("Missing api key header."), "secret");
	assert!(headers.get("x-checkout-token").is_none());
}

#[test]
fn checkout_token_replaces_api_key() {
	let headers = grounding_providers::auth_headers(Some("secret"), Some("tok"))
		.expect("Failed to build headers.");

	assert_eq!(headers.get("x-checkout-token").expect("Missing checkout header."), "tok");
	assert!(headers.get(AUTHORIZATION).is_none());
	assert!(
		grounding_providers::auth_headers(None, Some("  "))
			.expect("Failed to build headers.")
			.is_empty()
	);
}

#[test]
fn client_requires_api_base() {
	let mut cfg = upstream("http://localhost");

	cfg.api_base = None;

	assert!(AgentSearchClient::new(&cfg).is_err());
}

#[tokio::test]
async fn scoped_search_sends_repeated_merchants_and_decodes_nested_items() {
	let (base, state, shutdown) = start_search_server(Behavior::Ok).await;
	let client = AgentSearchClient::new(&upstream(&base)).expect("Failed to build client.");
	let merchants = vec!["m1".to_string(), "m2".to_string()];
	let batch = client.search(&request(&merchants, 0, 1_000)).await.expect("Search failed.");

	assert_eq!(batch.attempts, 1);
	assert_eq!(batch.products.len(), 1);
	assert_eq!(batch.products[0].brand, "Winona");

	let seen = state.seen.lock().unwrap_or_else(|err| err.into_inner()).clone();
	let (query, headers) = &seen[0];
	let query = query.clone().unwrap_or_default();

	assert!(query.contains("merchant_ids=m1&merchant_ids=m2"), "query was {query}");
	assert!(query.contains("in_stock_only=false"));
	assert!(query.contains("offset=0"));
	assert!(!query.contains("search_all_merchants"));
	assert_eq!(headers.get("x-api-key").expect("Missing api key header."), "secret");

	let _ = shutdown.send(());
}

#[tokio::test]
async fn per_call_checkout_token_overrides_configured_key() {
	let (base, state, shutdown) = start_search_server(Behavior::Ok).await;
	let client = AgentSearchClient::new(&upstream(&base)).expect("Failed to build client.");
	let mut req = request(&[], 0, 1_000);

	req.checkout_token = Some("checkout-abc");

	client.search(&req).await.expect("Search failed.");

	let seen = state.seen.lock().unwrap_or_else(|err| err.into_inner()).clone();
	let (query, headers) = &seen[0];

	assert!(query.clone().unwrap_or_default().contains("search_all_merchants=true"));
	assert_eq!(headers.get("x-checkout-token").expect("Missing checkout header."), "checkout-abc");
	assert!(headers.get("x-api-key").is_none());

	let _ = shutdown.send(());
}

#[tokio::test]
async fn retries_server_errors_then_succeeds() {
	let (base, state, shutdown) = start_search_server(Behavior::FailFirst(503)).await;
	let client = AgentSearchClient::new(&upstream(&base)).expect("Failed to build client.");
	let batch = client.search(&request(&[], 1, 1_000)).await.expect("Search failed.");

	assert_eq!(batch.attempts, 2);
	assert_eq!(batch.products.len(), 1);
	assert_eq!(state.calls.load(Ordering::SeqCst), 2);

	let _ = shutdown.send(());
}

#[tokio::test]
async fn rate_limit_exhausts_retries_with_status_reason() {
	let (base, state, shutdown) = start_search_server(Behavior::AlwaysStatus(429)).await;
	let client = AgentSearchClient::new(&upstream(&base)).expect("Failed to build client.");
	let failure = client.search(&request(&[], 2, 1_000)).await.expect_err("Expected failure.");

	assert_eq!(failure.reason, SourceFailureReason::UpstreamStatus(429));
	assert_eq!(failure.attempts, 3);
	assert_eq!(state.calls.load(Ordering::SeqCst), 3);

	let _ = shutdown.send(());
}

#[tokio::test]
async fn client_errors_are_not_retried() {
	let (base, state, shutdown) = start_search_server(Behavior::AlwaysStatus(404)).await;
	let client = AgentSearchClient::new(&upstream(&base)).expect("Failed to build client.");
	let failure = client.search(&request(&[], 3, 1_000)).await.expect_err("Expected failure.");

	assert_eq!(failure.reason, SourceFailureReason::UpstreamStatus(404));
	assert_eq!(failure.attempts, 1);
	assert_eq!(state.calls.load(Ordering::SeqCst), 1);

	let _ = shutdown.send(());
}

#[tokio::test]
async fn slow_upstream_is_reported_as_timeout() {
	let (base, _state, shutdown) = start_search_server(Behavior::Slow).await;
	let client = AgentSearchClient::new(&upstream(&base)).expect("Failed to build client.");
	let failure = client.search(&request(&[], 0, 100)).await.expect_err("Expected failure.");

	assert_eq!(failure.reason, SourceFailureReason::UpstreamTimeout);
	assert_eq!(failure.attempts, 1);

	let _ = shutdown.send(());
}

#[tokio::test]
async fn retries_share_the_call_window() {
	let (base, state, shutdown) = start_search_server(Behavior::FailFirstThenSlow(503)).await;
	let client = AgentSearchClient::new(&upstream(&base)).expect("Failed to build client.");
	let sent = AtomicU32::new(0);
	let req = SearchRequest {
		retry_backoff_ms: 200,
		attempts_sent: Some(&sent),
		..request(&[], 1, 300)
	};
	let started = Instant::now();
	let failure = client.search(&req).await.expect_err("Expected failure.");

	assert_eq!(failure.reason, SourceFailureReason::UpstreamTimeout);
	assert_eq!(failure.attempts, 2);
	assert_eq!(sent.load(Ordering::SeqCst), 2);
	assert_eq!(state.calls.load(Ordering::SeqCst), 2);
	assert!(started.elapsed() < Duration::from_millis(450), "took {:?}", started.elapsed());

	let _ = shutdown.send(());
}

#[tokio::test]
async fn backoff_past_the_window_stops_retrying() {
	let (base, state, shutdown) = start_search_server(Behavior::FailFirst(503)).await;
	let client = AgentSearchClient::new(&upstream(&base)).expect("Failed to build client.");
	let req = SearchRequest { retry_backoff_ms: 500, ..request(&[], 3, 100) };
	let failure = client.search(&req).await.expect_err("Expected failure.");

	assert_eq!(failure.reason, SourceFailureReason::UpstreamStatus(503));
	assert_eq!(failure.attempts, 1);
	assert_eq!(state.calls.load(Ordering::SeqCst), 1);

	let _ = shutdown.send(());
}
