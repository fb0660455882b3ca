use std::{cmp::Ordering, fmt};

use ahash::AHashSet;
use serde::{Serialize, Serializer};

use crate::scoring::{ScoreReason, ScoredCandidate, ScoringVersion};
use grounding_domain::ProductRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
	EmptyQuery,
	NoCandidates,
	LowConfidence,
	Matched(ScoreReason),
}
impl DecisionReason {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::EmptyQuery => "empty_query",
			Self::NoCandidates => "no_candidates",
			Self::LowConfidence => "low_confidence",
			Self::Matched(reason) => reason.as_str(),
		}
	}
}
impl fmt::Display for DecisionReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl Serialize for DecisionReason {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
	pub resolved: bool,
	pub product_ref: Option<ProductRef>,
	pub confidence: f32,
	pub reason: DecisionReason,
}
impl Decision {
	pub fn unresolved(reason: DecisionReason) -> Self {
		Self { resolved: false, product_ref: None, confidence: 0.0, reason }
	}
}

/// Drops repeated `merchant::product` keys, keeping the first occurrence in retrieval order.
pub fn dedup(candidates: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
	let mut seen = AHashSet::with_capacity(candidates.len());

	candidates.into_iter().filter(|candidate| seen.insert(candidate.key.clone())).collect()
}

pub fn sort(candidates: &mut [ScoredCandidate], version: ScoringVersion) {
	candidates.sort_by(|a, b| compare(a, b, version));
}

fn compare(a: &ScoredCandidate, b: &ScoredCandidate, version: ScoringVersion) -> Ordering {
	let by_signal = match version {
		ScoringVersion::V1 => Ordering::Equal,
		ScoringVersion::V2 => b.signal_score.total_cmp(&a.signal_score),
	};

	b.raw_rank_score
		.total_cmp(&a.raw_rank_score)
		.then(by_signal)
		.then(b.preferred_merchant.cmp(&a.preferred_merchant))
		.then(b.score.total_cmp(&a.score))
		.then_with(|| a.key.cmp(&b.key))
}

/// Takes the top-ranked candidate and applies the confidence threshold, inclusive.
pub fn decide(ranked: &[ScoredCandidate], threshold: f32) -> Decision {
	let Some(top) = ranked.first() else {
		return Decision::unresolved(DecisionReason::NoCandidates);
	};

	if top.score < threshold {
		return Decision {
			resolved: false,
			product_ref: None,
			confidence: top.score,
			reason: DecisionReason::LowConfidence,
		};
	}

	Decision {
		resolved: true,
		product_ref: Some(top.product_ref.clone()),
		confidence: top.score,
		reason: DecisionReason::Matched(top.reason),
	}
}
