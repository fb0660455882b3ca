use std::{
	sync::atomic::{AtomicU32, Ordering},
	time::Duration,
};

use reqwest::{Client, header::HeaderMap};
use serde_json::Value;
use tokio::time::Instant;

use crate::{Error, Result};
use grounding_domain::{CandidateProduct, SourceBatch, SourceFailure, SourceResult};

pub const MIN_REQUEST_TIMEOUT_MS: u64 = 50;
pub const MAX_REQUEST_TIMEOUT_MS: u64 = 15_000;
pub const MAX_LIMIT: u32 = 50;

type Extractor = fn(&Value) -> Option<&Vec<Value>>;

/// Accepted envelope shapes, tried in order. The first one that yields an array wins.
const RESPONSE_SHAPES: [(&str, Extractor); 7] = [
	("array", Value::as_array),
	("products", products),
	("data.products", data_products),
	("items", items),
	("data.items", data_items),
	("results", results),
	("data.results", data_results),
];

#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
	pub query: &'a str,
	/// Empty for an unscoped call.
	pub merchant_ids: &'a [String],
	pub search_all_merchants: bool,
	pub limit: u32,
	pub timeout_ms: u64,
	pub retries: u32,
	pub retry_backoff_ms: u64,
	/// Overrides the configured credentials for this call.
	pub checkout_token: Option<&'a str>,
	/// Bumped as each request is sent, so a caller that abandons the call still knows how many
	/// went out.
	pub attempts_sent: Option<&'a AtomicU32>,
}

/// Client for the upstream agent product search endpoint.
pub struct AgentSearchClient {
	client: Client,
	url: String,
	api_key: Option<String>,
	checkout_token: Option<String>,
}
impl AgentSearchClient {
	pub fn new(cfg: &grounding_config::Upstream) -> Result<Self> {
		let Some(api_base) = cfg.api_base.as_deref() else {
			return Err(Error::InvalidConfig {
				message: "upstream.api_base is required for agent search.".to_string(),
			});
		};
		let client = Client::builder().build()?;

		Ok(Self {
			client,
			url: format!("{}{}", api_base.trim_end_matches('/'), cfg.search_path),
			api_key: cfg.api_key.clone(),
			checkout_token: cfg.checkout_token.clone(),
		})
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	/// Runs the search with retries. Never returns a partial batch.
	pub async fn search(&self, req: &SearchRequest<'_>) -> SourceResult {
		let query = req.query.trim();

		if query.is_empty() {
			return Ok(SourceBatch::default());
		}

		let headers = match self.headers(req.checkout_token) {
			Ok(headers) => headers,
			Err(err) => {
				tracing::warn!(error = %err, "Agent search credentials are invalid.");

				return Err(SourceFailure::new(err.failure_reason(), 0));
			},
		};
		let params = query_params(query, req);
		let deadline = Instant::now()
			+ Duration::from_millis(
				req.timeout_ms.clamp(MIN_REQUEST_TIMEOUT_MS, MAX_REQUEST_TIMEOUT_MS),
			);
		let max_attempts = req.retries.min(grounding_config::MAX_RETRIES) + 1;
		let mut attempt = 0;

		loop {
			attempt += 1;

			if let Some(sent) = req.attempts_sent {
				sent.fetch_add(1, Ordering::Relaxed);
			}

			let remaining = deadline.saturating_duration_since(Instant::now());

			match self.search_once(&params, &headers, remaining).await {
				Ok(products) => return Ok(SourceBatch { products, attempts: attempt }),
				Err(err) => {
					let backoff = Duration::from_millis(
						req.retry_backoff_ms.saturating_mul(u64::from(attempt)),
					);
					// Retries share the call's window; never start one that cannot finish.
					let out_of_time = deadline.saturating_duration_since(Instant::now()) <= backoff;

					if attempt >= max_attempts || !err.is_retryable() || out_of_time {
						tracing::warn!(
							error = %err,
							attempts = attempt,
							scoped = !req.merchant_ids.is_empty(),
							"Agent search failed."
						);

						return Err(SourceFailure::new(err.failure_reason(), attempt));
					}

					tracing::debug!(
						error = %err,
						attempt,
						backoff_ms = backoff.as_millis() as u64,
						"Retrying agent search."
					);

					tokio::time::sleep(backoff).await;
				},
			}
		}
	}

	fn headers(&self, checkout_token: Option<&str>) -> Result<HeaderMap> {
		match checkout_token.map(str::trim).filter(|token| !token.is_empty()) {
			Some(token) => crate::auth_headers(None, Some(token)),
			None => crate::auth_headers(self.api_key.as_deref(), self.checkout_token.as_deref()),
		}
	}

	async fn search_once(
		&self,
		params: &[(&str, String)],
		headers: &HeaderMap,
		timeout: Duration,
	) -> Result<Vec<CandidateProduct>> {
		let res = self
			.client
			.get(&self.url)
			.query(params)
			.headers(headers.clone())
			.timeout(timeout)
			.send()
			.await?;
		let status = res.status();

		if !status.is_success() {
			return Err(Error::Status { status: status.as_u16() });
		}

		let body: Value = res.json().await?;

		Ok(extract_products(&body))
	}
}

/// Product records from any accepted envelope shape; unknown shapes yield nothing.
pub fn extract_products(body: &Value) -> Vec<CandidateProduct> {
	for (shape, extract) in RESPONSE_SHAPES {
		if let Some(list) = extract(body) {
			tracing::trace!(shape, count = list.len(), "Matched agent search response shape.");

			return list.iter().filter_map(CandidateProduct::from_json).collect();
		}
	}

	tracing::debug!("Agent search response has no recognized product list.");

	Vec::new()
}

fn query_params(query: &str, req: &SearchRequest<'_>) -> Vec<(&'static str, String)> {
	let mut params = vec![
		("query", query.to_string()),
		("in_stock_only", "false".to_string()),
		("limit", req.limit.clamp(1, MAX_LIMIT).to_string()),
		("offset", "0".to_string()),
	];

	if req.search_all_merchants {
		params.push(("search_all_merchants", "true".to_string()));
	}

	for merchant_id in req.merchant_ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
		params.push(("merchant_ids", merchant_id.to_string()));
	}

	params
}

fn field_array<'a>(body: &'a Value, field: &str) -> Option<&'a Vec<Value>> {
	body.get(field).and_then(Value::as_array)
}

fn nested_array<'a>(body: &'a Value, field: &str) -> Option<&'a Vec<Value>> {
	body.get("data").and_then(|data| field_array(data, field))
}

fn products(body: &Value) -> Option<&Vec<Value>> {
	field_array(body, "products")
}

fn data_products(body: &Value) -> Option<&Vec<Value>> {
	nested_array(body, "products")
}

fn items(body: &Value) -> Option<&Vec<Value>> {
	field_array(body, "items")
}

fn data_items(body: &Value) -> Option<&Vec<Value>> {
	nested_array(body, "items")
}

fn results(body: &Value) -> Option<&Vec<Value>> {
	field_array(body, "results")
}

fn data_results(body: &Value) -> Option<&Vec<Value>> {
	nested_array(body, "results")
}
