use std::{collections::HashSet, sync::Arc};

use serde::Deserialize;
use serde_json::Value;

use grounding_config::Config;
use grounding_domain::{CandidateProduct, Lang, ProductRef, SourceBatch, SourceResult};
use grounding_providers::search::SearchRequest;
use grounding_service::{
	BoxFuture, GroundingService, ResolveHints, ResolveOptions, ResolveRequest, ResolveResponse,
	ScoringVersion, SearchSource, Sources,
};

const SCHEMA_VERSION: &str = "grounding.golden.v2";
const RECALL_DEPTH: usize = 3;

#[derive(Debug, Deserialize)]
struct GoldenSuite {
	schema_version: String,
	cases: Vec<GoldenCase>,
}

#[derive(Debug, Deserialize)]
struct GoldenCase {
	id: String,
	query: String,
	#[serde(default)]
	lang: Lang,
	#[serde(default)]
	hints: Option<ResolveHints>,
	products: Vec<Value>,
	expected: Option<ProductRef>,
}

#[derive(Debug, Clone, Copy)]
struct Thresholds {
	coverage: f32,
	top1: f32,
	recall_at_3: f32,
	mrr: f32,
}

#[derive(Debug, Default)]
struct Metrics {
	positives: usize,
	resolved: usize,
	resolved_correct: usize,
	recalled: usize,
	reciprocal_rank_sum: f32,
	false_resolutions: Vec<String>,
}
impl Metrics {
	fn record(&mut self, case: &GoldenCase, res: &ResolveResponse) {
		let Some(expected) = case.expected.as_ref() else {
			if res.resolved {
				self.false_resolutions.push(case.id.clone());
			}

			return;
		};
		let rank = res
			.candidates
			.iter()
			.position(|candidate| &candidate.product_ref == expected)
			.map(|index| index + 1);

		self.positives += 1;

		if res.resolved {
			self.resolved += 1;

			if res.product_ref.as_ref() == Some(expected) {
				self.resolved_correct += 1;
			}
		}
		if let Some(rank) = rank {
			if rank <= RECALL_DEPTH {
				self.recalled += 1;
			}

			self.reciprocal_rank_sum += 1.0 / rank as f32;
		}
	}

	fn coverage(&self) -> f32 {
		ratio(self.resolved, self.positives)
	}

	/// Share of resolutions that picked the labeled product.
	fn top1(&self) -> f32 {
		ratio(self.resolved_correct, self.resolved)
	}

	fn recall_at_3(&self) -> f32 {
		ratio(self.recalled, self.positives)
	}

	fn mrr(&self) -> f32 {
		if self.positives == 0 { 0.0 } else { self.reciprocal_rank_sum / self.positives as f32 }
	}

	fn check(&self, version: ScoringVersion, thresholds: Thresholds) {
		let summary = format!(
			"{version:?}: coverage={:.3} top1={:.3} recall@3={:.3} mrr={:.3}",
			self.coverage(),
			self.top1(),
			self.recall_at_3(),
			self.mrr()
		);

		assert!(
			self.false_resolutions.is_empty(),
			"{summary} resolved negatives {:?}",
			self.false_resolutions
		);
		assert!(self.coverage() >= thresholds.coverage, "{summary}");
		assert!(self.top1() >= thresholds.top1, "{summary}");
		assert!(self.recall_at_3() >= thresholds.recall_at_3, "{summary}");
		assert!(self.mrr() >= thresholds.mrr, "{summary}");
	}
}

/// Search source that answers every call with one case's products.
struct FixtureSearch {
	products: Vec<CandidateProduct>,
}
impl SearchSource for FixtureSearch {
	fn search<'a>(&'a self, _: SearchRequest<'a>) -> BoxFuture<'a, SourceResult> {
		Box::pin(async move { Ok(SourceBatch { products: self.products.clone(), attempts: 1 }) })
	}
}

fn ratio(hits: usize, total: usize) -> f32 {
	if total == 0 { 0.0 } else { hits as f32 / total as f32 }
}

fn suite() -> GoldenSuite {
	serde_json::from_str(include_str!("fixtures/golden_v2.json"))
		.expect("Failed to parse golden fixture.")
}

fn config() -> Config {
	grounding_config::from_toml_str("[service]\nlog_level = \"info\"\n")
		.expect("Failed to parse test config.")
}

async fn evaluate(version: ScoringVersion) -> Metrics {
	let mut metrics = Metrics::default();

	for case in suite().cases {
		let search = FixtureSearch {
			products: case.products.iter().filter_map(CandidateProduct::from_json).collect(),
		};
		let service = GroundingService::with_sources(
			config(),
			Sources::new(None, Some(Arc::new(search) as Arc<dyn SearchSource>)),
		);
		let req = ResolveRequest {
			query: case.query.clone(),
			lang: case.lang,
			hints: case.hints.clone(),
			options: ResolveOptions {
				scoring_version: Some(version),
				candidates_limit: Some(12),
				..Default::default()
			},
			..Default::default()
		};
		let res = service.resolve(req).await;

		assert_eq!(res.metadata.lang, case.lang, "case {}", case.id);

		metrics.record(&case, &res);
	}

	metrics
}

#[test]
fn fixture_is_well_formed() {
	let suite = suite();
	let ids = suite.cases.iter().map(|case| case.id.as_str()).collect::<HashSet<_>>();

	assert_eq!(suite.schema_version, SCHEMA_VERSION);
	assert_eq!(ids.len(), suite.cases.len(), "case ids must be unique");
	assert!(suite.cases.iter().any(|case| case.expected.is_none()));

	for case in &suite.cases {
		assert!(!case.products.is_empty(), "case {} has no products", case.id);

		if let Some(expected) = case.expected.as_ref() {
			let listed = case
				.products
				.iter()
				.filter_map(CandidateProduct::from_json)
				.filter_map(|product| product.product_ref())
				.any(|product_ref| &product_ref == expected);

			assert!(listed, "case {} expects a product it does not list", case.id);
		}
	}
}

#[tokio::test(start_paused = true)]
async fn lexical_scoring_meets_golden_thresholds() {
	let metrics = evaluate(ScoringVersion::V1).await;

	metrics.check(
		ScoringVersion::V1,
		Thresholds { coverage: 0.7, top1: 0.85, recall_at_3: 0.95, mrr: 0.9 },
	);
}

#[tokio::test(start_paused = true)]
async fn signal_scoring_meets_golden_thresholds() {
	let metrics = evaluate(ScoringVersion::V2).await;

	metrics.check(
		ScoringVersion::V2,
		Thresholds { coverage: 0.75, top1: 0.85, recall_at_3: 0.95, mrr: 0.9 },
	);
}

#[tokio::test(start_paused = true)]
async fn signal_scoring_covers_at_least_as_much_as_lexical() {
	let v1 = evaluate(ScoringVersion::V1).await;
	let v2 = evaluate(ScoringVersion::V2).await;

	assert!(v2.resolved >= v1.resolved, "v1 resolved {}, v2 {}", v1.resolved, v2.resolved);
}
