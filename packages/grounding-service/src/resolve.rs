use std::{
	sync::atomic::{AtomicU32, Ordering},
	time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
	BoxFuture, CatalogSource, GroundingService, SearchSource,
	budget::{Allocation, Deadline, Stage, allocate},
	hints::{self, HINT_SOURCE, ResolveHints},
	rank::{self, Decision, DecisionReason},
	scoring::{self, QueryProfile, ScoredCandidate, ScoringVersion},
};
use grounding_domain::{
	CandidateProduct, Lang, ProductRef, SourceBatch, SourceFailure, SourceFailureReason,
	SourceResult,
};
use grounding_providers::search::SearchRequest;
use grounding_storage::catalog::CatalogQuery;

pub const MAX_PREFER_MERCHANTS: usize = 20;
pub const MAX_LIMIT: u32 = 50;
pub const MAX_CANDIDATES_LIMIT: u32 = 12;
/// Global stages always ask for at least this many results.
pub const GLOBAL_MIN_LIMIT: u32 = 18;

const GLOBAL_FLOOR_MIN: u32 = 6;
const GLOBAL_FLOOR_MAX: u32 = 14;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveRequest {
	pub query: String,
	#[serde(default)]
	pub lang: Lang,
	#[serde(default)]
	pub hints: Option<ResolveHints>,
	#[serde(default)]
	pub options: ResolveOptions,
	/// Short-lived upstream credential that replaces the configured ones for this call.
	#[serde(default)]
	pub checkout_token: Option<String>,
}

/// Per-call overrides. Every field falls back to the service config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveOptions {
	#[serde(default)]
	pub scoring_version: Option<ScoringVersion>,
	#[serde(default)]
	pub min_confidence: Option<f32>,
	#[serde(default)]
	pub prefer_merchants: Vec<String>,
	#[serde(default)]
	pub allow_external_seed: Option<bool>,
	#[serde(default)]
	pub search_all_merchants: Option<bool>,
	#[serde(default)]
	pub limit: Option<u32>,
	#[serde(default)]
	pub timeout_ms: Option<u64>,
	#[serde(default)]
	pub upstream_retries: Option<u32>,
	#[serde(default)]
	pub upstream_retry_backoff_ms: Option<u64>,
	#[serde(default)]
	pub candidates_limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveResponse {
	pub resolved: bool,
	pub product_ref: Option<ProductRef>,
	pub confidence: f32,
	pub reason: DecisionReason,
	pub candidates: Vec<CandidateSummary>,
	pub normalized_query: String,
	pub scoring_version: ScoringVersion,
	pub metadata: ResolveMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateSummary {
	pub product_ref: ProductRef,
	pub title: Option<String>,
	pub score: f32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub merchant_name: Option<String>,
}
impl From<&ScoredCandidate> for CandidateSummary {
	fn from(candidate: &ScoredCandidate) -> Self {
		Self {
			product_ref: candidate.product_ref.clone(),
			title: candidate.title.clone(),
			score: candidate.score,
			merchant_name: candidate.merchant_name.clone(),
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveMetadata {
	pub lang: Lang,
	pub timeout_ms: u64,
	pub latency_ms: u64,
	pub scoring_version: ScoringVersion,
	pub sources: Vec<SourceDiagnostic>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub query_from_hints: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub effective_query: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub original_query: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub prefer_merchants: Option<Vec<String>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub allow_external_seed: Option<bool>,
}

/// Outcome of one candidate-source stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDiagnostic {
	pub source: String,
	pub ok: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub count: Option<usize>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<SourceFailureReason>,
	pub attempts: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timeout_ms: Option<u64>,
}
impl SourceDiagnostic {
	fn succeeded(source: &str, count: usize, attempts: u32, timeout_ms: Option<u64>) -> Self {
		Self {
			source: source.to_string(),
			ok: true,
			count: Some(count),
			reason: None,
			attempts,
			timeout_ms,
		}
	}

	fn failed(source: &str, failure: SourceFailure, timeout_ms: Option<u64>) -> Self {
		Self {
			source: source.to_string(),
			ok: false,
			count: None,
			reason: Some(failure.reason),
			attempts: failure.attempts,
			timeout_ms,
		}
	}
}

/// Request options resolved against the config and clamped.
#[derive(Debug, Clone)]
struct Plan {
	version: ScoringVersion,
	threshold: f32,
	prefer_merchants: Vec<String>,
	allow_external_seed: bool,
	search_all: bool,
	limit: u32,
	timeout_ms: u64,
	retries: u32,
	retry_backoff_ms: u64,
	candidates_limit: usize,
}
impl Plan {
	fn new(cfg: &grounding_config::Config, options: &ResolveOptions) -> Self {
		let resolver = &cfg.resolver;
		let version = options
			.scoring_version
			.or_else(|| ScoringVersion::parse(&resolver.scoring_version))
			.unwrap_or_default();
		let threshold = options
			.min_confidence
			.filter(|value| value.is_finite())
			.map(|value| value.clamp(0.0, 1.0))
			.unwrap_or_else(|| version.default_threshold(resolver));
		let prefer_merchants = prefer_merchants(&options.prefer_merchants);
		let search_all = options.search_all_merchants == Some(true)
			|| (prefer_merchants.is_empty() && options.search_all_merchants != Some(false));

		Self {
			version,
			threshold,
			search_all,
			prefer_merchants,
			allow_external_seed: options.allow_external_seed == Some(true),
			limit: options.limit.unwrap_or(resolver.limit).clamp(1, MAX_LIMIT),
			timeout_ms: options
				.timeout_ms
				.unwrap_or(resolver.timeout_ms)
				.clamp(grounding_config::MIN_TIMEOUT_MS, grounding_config::MAX_TIMEOUT_MS),
			retries: options
				.upstream_retries
				.unwrap_or(cfg.upstream.retries)
				.min(grounding_config::MAX_RETRIES),
			retry_backoff_ms: options
				.upstream_retry_backoff_ms
				.unwrap_or(cfg.upstream.retry_backoff_ms)
				.min(grounding_config::MAX_RETRY_BACKOFF_MS),
			candidates_limit: options
				.candidates_limit
				.unwrap_or(resolver.candidates_limit)
				.clamp(1, MAX_CANDIDATES_LIMIT) as usize,
		}
	}

	fn has_scope(&self) -> bool {
		!self.prefer_merchants.is_empty()
	}

	fn stage_limit(&self, stage: Stage) -> u32 {
		if stage.is_scoped() { self.limit } else { self.limit.max(GLOBAL_MIN_LIMIT) }
	}

	/// Global stages only run while fewer candidates than this have been collected.
	fn global_floor(&self) -> usize {
		self.limit.clamp(GLOBAL_FLOOR_MIN, GLOBAL_FLOOR_MAX) as usize
	}
}

/// Borrowed inputs shared by every stage of one resolution.
struct StageInput<'a> {
	plan: &'a Plan,
	query: &'a str,
	tokens: &'a [String],
	checkout_token: Option<&'a str>,
	deadline: &'a Deadline,
}

impl GroundingService {
	/// Resolves one free-text product mention. Never fails: degraded sources are reported in
	/// `metadata.sources` and the decision reflects whatever candidates were collected.
	pub async fn resolve(&self, req: ResolveRequest) -> ResolveResponse {
		let plan = Plan::new(&self.cfg, &req.options);
		let deadline = Deadline::after(plan.timeout_ms);
		let effective = hints::effective_query(&req.query, req.hints.as_ref());
		let query = QueryProfile::new(&effective.normalized, &self.brands);
		let mut metadata = ResolveMetadata {
			lang: req.lang,
			timeout_ms: plan.timeout_ms,
			latency_ms: 0,
			scoring_version: plan.version,
			sources: Vec::new(),
			query_from_hints: None,
			effective_query: None,
			original_query: None,
			prefer_merchants: plan.has_scope().then(|| plan.prefer_merchants.clone()),
			allow_external_seed: plan.allow_external_seed.then_some(true),
		};

		if effective.from_hints {
			metadata.query_from_hints = Some(true);
			metadata.effective_query = Some(effective.query.clone());
			metadata.original_query = Some(req.query.trim().to_string());
		}
		if query.is_empty() {
			tracing::debug!("Query is empty after normalization.");

			metadata.latency_ms = deadline.elapsed_ms();

			return envelope(Decision::unresolved(DecisionReason::EmptyQuery), &[], query, metadata);
		}

		let mut products = Vec::new();

		if let Some(seed) =
			req.hints.as_ref().and_then(|hints| hints::seed_candidate(hints, &effective.query))
		{
			products.push(seed);
			metadata.sources.push(SourceDiagnostic::succeeded(HINT_SOURCE, 1, 0, None));
		}

		let input = StageInput {
			plan: &plan,
			query: &effective.query,
			tokens: &query.tokens,
			checkout_token: req.checkout_token.as_deref(),
			deadline: &deadline,
		};
		let mut scoped_catalog_count = 0;

		for stage in Stage::ALL {
			if !stage_gate(stage, &plan, scoped_catalog_count, products.len()) {
				continue;
			}

			let (diagnostic, batch) = self.run_stage(stage, &input).await;

			if stage == Stage::ScopedCatalog {
				scoped_catalog_count = batch.len();
			}

			products.extend(batch);
			metadata.sources.push(diagnostic);
		}

		let scored = products
			.iter()
			.filter_map(|product| {
				scoring::score_candidate(
					plan.version,
					&query,
					product,
					&self.brands,
					&plan.prefer_merchants,
				)
			})
			.collect::<Vec<_>>();
		let mut ranked = rank::dedup(scored);

		rank::sort(&mut ranked, plan.version);

		let decision = rank::decide(&ranked, plan.threshold);

		metadata.latency_ms = deadline.elapsed_ms();

		tracing::info!(
			resolved = decision.resolved,
			reason = %decision.reason,
			confidence = decision.confidence,
			candidates = ranked.len(),
			latency_ms = metadata.latency_ms,
			scoring_version = plan.version.as_str(),
			"Product grounding resolved."
		);

		let top = &ranked[..ranked.len().min(plan.candidates_limit)];

		envelope(decision, top, query, metadata)
	}

	async fn run_stage(
		&self,
		stage: Stage,
		input: &StageInput<'_>,
	) -> (SourceDiagnostic, Vec<CandidateProduct>) {
		let source = stage.source_name();
		let plan = input.plan;
		let Some(handle) = self.source_handle(stage) else {
			let reason = if stage.is_catalog() {
				SourceFailureReason::DbNotConfigured
			} else {
				SourceFailureReason::UpstreamNotConfigured
			};

			tracing::debug!(source, %reason, "Candidate source is not configured.");

			let failure = SourceFailure::new(reason, 0);

			return (SourceDiagnostic::failed(source, failure, None), Vec::new());
		};
		let budget = &self.cfg.resolver.budget;
		let stage_budget = stage.budget(budget);
		let remaining_ms = input.deadline.remaining_ms();
		let reserve_ms = stage.reserve_ms(budget, plan.has_scope(), plan.search_all);
		let timeout_ms =
			match allocate(remaining_ms, stage_budget.cap_ms, reserve_ms, stage_budget.floor_ms) {
				Allocation::Run { timeout_ms } => timeout_ms,
				Allocation::Skip => {
					tracing::debug!(source, remaining_ms, "Candidate stage skipped for budget.");

					let failure = SourceFailure::new(SourceFailureReason::BudgetExhausted, 0);

					return (SourceDiagnostic::failed(source, failure, None), Vec::new());
				},
			};

		tracing::debug!(source, timeout_ms, remaining_ms, reserve_ms, "Running candidate stage.");

		let sent = AtomicU32::new(0);
		let call = call(handle, stage, input, timeout_ms, &sent);
		let result = match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
			Ok(result) => result,
			Err(_) => {
				let attempts = sent.load(Ordering::Relaxed).max(1);

				Err(SourceFailure::new(stage.timeout_reason(), attempts))
			},
		};

		match result {
			Ok(SourceBatch { products, attempts }) => {
				let fetched = products.len();
				let usable = products
					.into_iter()
					.filter(|product| plan.allow_external_seed || !product.is_external())
					.collect::<Vec<_>>();

				if usable.is_empty() {
					tracing::debug!(source, fetched, "Candidate stage produced no usable results.");

					let failure = SourceFailure::new(SourceFailureReason::NoResults, attempts);

					return (SourceDiagnostic::failed(source, failure, Some(timeout_ms)), usable);
				}

				let diagnostic =
					SourceDiagnostic::succeeded(source, usable.len(), attempts, Some(timeout_ms));

				(diagnostic, usable)
			},
			Err(failure) => {
				if failure.reason.is_degraded() {
					tracing::warn!(
						source,
						reason = %failure.reason,
						attempts = failure.attempts,
						"Candidate source degraded."
					);
				}

				(SourceDiagnostic::failed(source, failure, Some(timeout_ms)), Vec::new())
			},
		}
	}

	fn source_handle(&self, stage: Stage) -> Option<SourceHandle<'_>> {
		if stage.is_catalog() {
			self.sources.catalog.as_deref().map(SourceHandle::Catalog)
		} else {
			self.sources.search.as_deref().map(SourceHandle::Search)
		}
	}
}

#[derive(Clone, Copy)]
enum SourceHandle<'a> {
	Catalog(&'a dyn CatalogSource),
	Search(&'a dyn SearchSource),
}

fn call<'a>(
	handle: SourceHandle<'a>,
	stage: Stage,
	input: &'a StageInput<'a>,
	timeout_ms: u64,
	sent: &'a AtomicU32,
) -> BoxFuture<'a, SourceResult> {
	let plan = input.plan;
	let limit = plan.stage_limit(stage);

	match handle {
		SourceHandle::Catalog(catalog) => {
			let merchant_ids = stage.is_scoped().then_some(plan.prefer_merchants.as_slice());

			catalog.search(CatalogQuery { merchant_ids, tokens: input.tokens, limit, timeout_ms })
		},
		SourceHandle::Search(search) => {
			let merchant_ids: &[String] =
				if stage.is_scoped() { &plan.prefer_merchants } else { &[] };

			search.search(SearchRequest {
				query: input.query,
				merchant_ids,
				search_all_merchants: !stage.is_scoped(),
				limit,
				timeout_ms,
				retries: plan.retries,
				retry_backoff_ms: plan.retry_backoff_ms,
				checkout_token: input.checkout_token,
				attempts_sent: Some(sent),
			})
		},
	}
}

fn stage_gate(stage: Stage, plan: &Plan, scoped_catalog_count: usize, collected: usize) -> bool {
	match stage {
		Stage::ScopedCatalog => plan.has_scope(),
		Stage::ScopedSearch => plan.has_scope() && scoped_catalog_count == 0,
		Stage::GlobalCatalog | Stage::GlobalSearch =>
			plan.search_all && collected < plan.global_floor(),
	}
}

/// Trimmed, de-duplicated preferred merchants in caller order.
fn prefer_merchants(raw: &[String]) -> Vec<String> {
	let mut out: Vec<String> = Vec::new();

	for merchant_id in raw.iter().map(|value| value.trim()).filter(|value| !value.is_empty()) {
		if out.len() >= MAX_PREFER_MERCHANTS {
			break;
		}
		if !out.iter().any(|kept| kept == merchant_id) {
			out.push(merchant_id.to_string());
		}
	}

	out
}

fn envelope(
	decision: Decision,
	candidates: &[ScoredCandidate],
	query: QueryProfile,
	metadata: ResolveMetadata,
) -> ResolveResponse {
	ResolveResponse {
		resolved: decision.resolved,
		product_ref: decision.product_ref,
		confidence: decision.confidence,
		reason: decision.reason,
		candidates: candidates.iter().map(CandidateSummary::from).collect(),
		normalized_query: query.normalized,
		scoring_version: metadata.scoring_version,
		metadata,
	}
}
