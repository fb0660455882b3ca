pub mod v1;
pub mod v2;

use std::{
	collections::{BTreeSet, HashSet},
	fmt,
};

use serde::{Deserialize, Serialize};

use grounding_domain::{BrandIndex, CandidateProduct, ProductRef, Signals, extract_signals, text};

pub const PREFERRED_MERCHANT_BOOST: f32 = 0.18;
pub const INVENTORY_BOOST: f32 = 0.05;
pub const NOT_ORDERABLE_PENALTY: f32 = -0.25;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringVersion {
	V1,
	#[default]
	V2,
}
impl ScoringVersion {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_lowercase().as_str() {
			"v1" => Some(Self::V1),
			"v2" => Some(Self::V2),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::V1 => "v1",
			Self::V2 => "v2",
		}
	}

	pub fn default_threshold(self, cfg: &grounding_config::Resolver) -> f32 {
		match self {
			Self::V1 => cfg.v1_min_confidence,
			Self::V2 => cfg.v2_min_confidence,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreReason {
	ExactTitle,
	ExactCombined,
	TitleContainsQuery,
	BrandTitleContainsQuery,
	CompactContainsQuery,
	TokenOverlap,
}
impl ScoreReason {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::ExactTitle => "exact_title",
			Self::ExactCombined => "exact_combined",
			Self::TitleContainsQuery => "title_contains_query",
			Self::BrandTitleContainsQuery => "brand_title_contains_query",
			Self::CompactContainsQuery => "compact_contains_query",
			Self::TokenOverlap => "token_overlap",
		}
	}
}
impl fmt::Display for ScoreReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Query-side view shared by both scorers.
#[derive(Debug, Clone)]
pub struct QueryProfile {
	pub normalized: String,
	pub compact: String,
	pub tokens: Vec<String>,
	pub signals: Signals,
	pub brands: BTreeSet<String>,
}
impl QueryProfile {
	pub fn new(normalized: &str, brands: &BrandIndex) -> Self {
		Self {
			normalized: normalized.to_string(),
			compact: text::compact(normalized),
			tokens: text::tokenize(normalized),
			signals: extract_signals(&text::words(normalized)),
			brands: brands.detect(normalized),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.normalized.is_empty() || self.tokens.is_empty()
	}
}

/// Candidate-side view, computed once per candidate per scoring pass.
#[derive(Debug, Clone)]
pub struct CandidateProfile {
	pub title: String,
	pub combined: String,
	pub compact: String,
	pub tokens: HashSet<String>,
	pub signals: Signals,
	pub brands: BTreeSet<String>,
}
impl CandidateProfile {
	pub fn new(product: &CandidateProduct, brands: &BrandIndex) -> Self {
		let title = text::normalize(&product.title);
		let combined = text::normalize(&format!("{} {}", product.brand, product.title));

		Self {
			compact: text::compact(&combined),
			tokens: text::tokenize(&combined).into_iter().collect(),
			signals: extract_signals(&text::words(&combined)),
			brands: brands.detect(&combined),
			title,
			combined,
		}
	}
}

/// Text relevance before merchant, inventory and orderability adjustments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextScore {
	pub score: f32,
	pub reason: ScoreReason,
	/// Unclamped signal and brand deltas; a ranking tie-breaker only.
	pub signal_score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
	pub product_ref: ProductRef,
	#[serde(skip)]
	pub key: String,
	pub title: Option<String>,
	pub merchant_name: Option<String>,
	/// Clamped to `[0, 1]` and rounded; surfaced as confidence.
	pub score: f32,
	pub raw_rank_score: f32,
	pub signal_score: f32,
	pub preferred_merchant: bool,
	pub reason: ScoreReason,
}

pub fn text_score(
	version: ScoringVersion,
	query: &QueryProfile,
	candidate: &CandidateProfile,
) -> TextScore {
	match version {
		ScoringVersion::V1 => v1::score(query, candidate),
		ScoringVersion::V2 => v2::score(query, candidate),
	}
}

/// Scores one candidate. Returns `None` when the product has no usable ref.
pub fn score_candidate(
	version: ScoringVersion,
	query: &QueryProfile,
	product: &CandidateProduct,
	brands: &BrandIndex,
	prefer_merchants: &[String],
) -> Option<ScoredCandidate> {
	let product_ref = product.product_ref()?;
	let profile = CandidateProfile::new(product, brands);
	let text = text_score(version, query, &profile);
	let preferred_merchant = product_ref
		.merchant_id
		.as_deref()
		.is_some_and(|merchant_id| prefer_merchants.iter().any(|value| value == merchant_id));
	let raw_rank_score = text.score + adjustments(product, preferred_merchant);

	Some(ScoredCandidate {
		key: product_ref.dedup_key(),
		product_ref,
		title: Some(product.title.trim().to_string()).filter(|title| !title.is_empty()),
		merchant_name: product.merchant_name.clone(),
		score: surfaced_score(raw_rank_score),
		raw_rank_score,
		signal_score: text.signal_score,
		preferred_merchant,
		reason: text.reason,
	})
}

pub fn adjustments(product: &CandidateProduct, preferred_merchant: bool) -> f32 {
	let mut delta = 0.0;

	if preferred_merchant {
		delta += PREFERRED_MERCHANT_BOOST;
	}
	if product.in_stock == Some(true) || product.inventory_quantity.is_some_and(|qty| qty > 0.0) {
		delta += INVENTORY_BOOST;
	}
	if product.orderable == Some(false) {
		delta += NOT_ORDERABLE_PENALTY;
	}

	delta
}

pub fn surfaced_score(raw: f32) -> f32 {
	round4(raw.clamp(0.0, 1.0))
}

/// Token-set overlap: `max(F1, recall * 0.9)`, plus the matched-token count.
pub fn token_overlap(query_tokens: &[String], candidate_tokens: &HashSet<String>) -> (f32, usize) {
	if query_tokens.is_empty() || candidate_tokens.is_empty() {
		return (0.0, 0);
	}

	let common = query_tokens.iter().filter(|token| candidate_tokens.contains(*token)).count();
	let recall = common as f32 / query_tokens.len() as f32;
	let precision = common as f32 / candidate_tokens.len() as f32;
	let f1 = if recall + precision > 0.0 {
		2.0 * recall * precision / (recall + precision)
	} else {
		0.0
	};

	(f1.max(recall * 0.9), common)
}

fn round4(value: f32) -> f32 {
	(value * 10_000.0).round() / 10_000.0
}
