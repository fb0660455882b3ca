//! Signal-augmented scorer.
//!
//! Starts from the same token-overlap baseline as v1, lifts substring matches to fixed floors,
//! then moves the score by numeric-signal and brand agreement. Two candidates that share every
//! title word but differ in volume or SPF end up separated by the signal deltas.

use std::collections::BTreeSet;

use crate::scoring::{CandidateProfile, QueryProfile, ScoreReason, TextScore, token_overlap};

const CONTAINMENT_BOOST: f32 = 0.06;
const TITLE_CONTAINS_FLOOR: f32 = 0.90;
const COMBINED_CONTAINS_FLOOR: f32 = 0.84;
const COMPACT_CONTAINS_FLOOR: f32 = 0.82;
const COMPACT_MIN_CHARS: usize = 2;
/// Highest text score a non-exact match can reach, so only exact matches score 1.0.
const NON_EXACT_CEILING: f32 = 0.99;

const BRAND_AGREE: f32 = 0.14;
const BRAND_DISAGREE: f32 = -0.06;

const NO_OVERLAP_PENALTY: f32 = -0.18;
const SPARSE_OVERLAP_PENALTY: f32 = -0.10;
const SHORT_QUERY_PENALTY: f32 = -0.08;

#[derive(Debug, Clone, Copy)]
struct FamilyDelta {
	agree: f32,
	disagree: f32,
	missing: f32,
}

const VOLUME: FamilyDelta = FamilyDelta { agree: 0.18, disagree: -0.22, missing: -0.04 };
const SPF: FamilyDelta = FamilyDelta { agree: 0.14, disagree: -0.16, missing: -0.03 };
const PERCENT: FamilyDelta = FamilyDelta { agree: 0.10, disagree: -0.12, missing: -0.02 };
const MODEL: FamilyDelta = FamilyDelta { agree: 0.08, disagree: -0.10, missing: 0.0 };

pub fn score(query: &QueryProfile, candidate: &CandidateProfile) -> TextScore {
	let signal_score = signal_delta(query, candidate) + brand_delta(query, candidate);

	if candidate.title == query.normalized {
		return TextScore { score: 1.0, reason: ScoreReason::ExactTitle, signal_score };
	}
	if candidate.combined == query.normalized {
		return TextScore { score: 1.0, reason: ScoreReason::ExactCombined, signal_score };
	}

	let (base, common) = token_overlap(&query.tokens, &candidate.tokens);
	let (score, reason) = if candidate.title.contains(&query.normalized) {
		(
			(base + CONTAINMENT_BOOST).max(TITLE_CONTAINS_FLOOR),
			ScoreReason::TitleContainsQuery,
		)
	} else if candidate.combined.contains(&query.normalized) {
		(
			(base + CONTAINMENT_BOOST).max(COMBINED_CONTAINS_FLOOR),
			ScoreReason::BrandTitleContainsQuery,
		)
	} else if query.compact.chars().count() >= COMPACT_MIN_CHARS
		&& candidate.compact.contains(&query.compact)
	{
		(base.max(COMPACT_CONTAINS_FLOOR), ScoreReason::CompactContainsQuery)
	} else {
		(base + overlap_penalty(query.tokens.len(), common), ScoreReason::TokenOverlap)
	};

	TextScore { score: (score + signal_score).clamp(0.0, NON_EXACT_CEILING), reason, signal_score }
}

/// Penalty for queries whose tokens barely appear in the candidate. Only applies when no
/// substring match lifted the score.
fn overlap_penalty(query_tokens: usize, common: usize) -> f32 {
	if common == 0 && query_tokens >= 2 {
		NO_OVERLAP_PENALTY
	} else if query_tokens >= 3 && common <= 1 {
		SPARSE_OVERLAP_PENALTY
	} else if query_tokens <= 1 && common == 0 {
		SHORT_QUERY_PENALTY
	} else {
		0.0
	}
}

fn signal_delta(query: &QueryProfile, candidate: &CandidateProfile) -> f32 {
	let (q, c) = (&query.signals, &candidate.signals);

	family_delta(&q.volume, &c.volume, VOLUME)
		+ family_delta(&q.spf, &c.spf, SPF)
		+ family_delta(&q.percent, &c.percent, PERCENT)
		+ family_delta(&q.model, &c.model, MODEL)
}

fn family_delta(query: &BTreeSet<String>, candidate: &BTreeSet<String>, delta: FamilyDelta) -> f32 {
	if query.is_empty() {
		0.0
	} else if candidate.is_empty() {
		delta.missing
	} else if !query.is_disjoint(candidate) {
		delta.agree
	} else {
		delta.disagree
	}
}

fn brand_delta(query: &QueryProfile, candidate: &CandidateProfile) -> f32 {
	if query.brands.is_empty() {
		0.0
	} else if !query.brands.is_disjoint(&candidate.brands) {
		BRAND_AGREE
	} else if !candidate.brands.is_empty() {
		BRAND_DISAGREE
	} else {
		0.0
	}
}
