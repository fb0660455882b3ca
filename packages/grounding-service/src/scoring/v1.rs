//! Lexical scorer: exact and containment matches first, token overlap otherwise.

use crate::scoring::{CandidateProfile, QueryProfile, ScoreReason, TextScore, token_overlap};

pub fn score(query: &QueryProfile, candidate: &CandidateProfile) -> TextScore {
	let (score, reason) = if candidate.title == query.normalized {
		(1.0, ScoreReason::ExactTitle)
	} else if candidate.title.contains(&query.normalized) {
		(0.95, ScoreReason::TitleContainsQuery)
	} else if candidate.combined.contains(&query.normalized) {
		(0.90, ScoreReason::BrandTitleContainsQuery)
	} else {
		(token_overlap(&query.tokens, &candidate.tokens).0, ScoreReason::TokenOverlap)
	};

	TextScore { score: score.clamp(0.0, 1.0), reason, signal_score: 0.0 }
}
