use serde::{Deserialize, Serialize};

use grounding_domain::{CandidateProduct, ProductRef, text};

pub const HINT_SOURCE: &str = "hints";

/// Caller-side knowledge about the product being resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolveHints {
	#[serde(default)]
	pub product_ref: Option<ProductRef>,
	#[serde(default)]
	pub aliases: Vec<String>,
	#[serde(default)]
	pub brand: Option<String>,
}

/// The query actually scored, after substituting a hint alias for an opaque raw query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveQuery {
	pub query: String,
	pub normalized: String,
	pub from_hints: bool,
}

pub fn effective_query(raw: &str, hints: Option<&ResolveHints>) -> EffectiveQuery {
	let query = raw.trim();
	let normalized = text::normalize(query);

	if !text::looks_like_opaque_id(query) && !normalized.is_empty() {
		return EffectiveQuery { query: query.to_string(), normalized, from_hints: false };
	}

	let alias = hints.into_iter().flat_map(|hints| hints.aliases.iter()).find_map(|alias| {
		let alias = alias.trim();
		let normalized = text::normalize(alias);

		(!normalized.is_empty()).then(|| (alias.to_string(), normalized))
	});

	match alias {
		Some((query, normalized)) => EffectiveQuery { query, normalized, from_hints: true },
		None => EffectiveQuery { query: query.to_string(), normalized, from_hints: false },
	}
}

/// Synthetic first candidate for a caller-asserted product ref.
pub fn seed_candidate(hints: &ResolveHints, effective_query: &str) -> Option<CandidateProduct> {
	let hinted = hints.product_ref.as_ref()?;
	let product_ref = ProductRef::new(&hinted.product_id, hinted.merchant_id.as_deref())?;
	let title = hints
		.aliases
		.iter()
		.map(|alias| alias.trim())
		.find(|alias| !alias.is_empty())
		.unwrap_or(effective_query)
		.to_string();

	Some(CandidateProduct {
		product_id: product_ref.product_id,
		merchant_id: product_ref.merchant_id,
		title,
		brand: hints.brand.as_deref().map(str::trim).unwrap_or_default().to_string(),
		source: Some(HINT_SOURCE.to_string()),
		..Default::default()
	})
}
