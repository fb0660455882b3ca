use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{Error, Result};
use grounding_domain::CandidateProduct;

pub const MAX_QUERY_TOKENS: usize = 10;
pub const MIN_STATEMENT_TIMEOUT_MS: u64 = 50;
pub const MAX_STATEMENT_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_SOURCE_TYPE: &str = "products_cache";

const MIN_FETCH_LIMIT: u32 = 80;
const MAX_FETCH_LIMIT: u32 = 250;
const FETCH_MULTIPLIER: u32 = 6;
const MATCH_FIELDS: [&str; 7] =
	["title", "name", "description", "product_type", "sku", "vendor", "brand"];

/// One bounded read against the sellable-product cache.
#[derive(Debug, Clone)]
pub struct CatalogQuery<'a> {
	/// `None` searches every merchant.
	pub merchant_ids: Option<&'a [String]>,
	/// Normalized query tokens; each one must match at least one text field.
	pub tokens: &'a [String],
	pub limit: u32,
	pub timeout_ms: u64,
}
impl CatalogQuery<'_> {
	pub fn fetch_limit(&self) -> u32 {
		self.limit.saturating_mul(FETCH_MULTIPLIER).clamp(MIN_FETCH_LIMIT, MAX_FETCH_LIMIT)
	}
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CatalogRow {
	pub merchant_id: String,
	pub cache_product_id: String,
	pub product_data: Value,
}
impl CatalogRow {
	/// Decodes the cached record, with the row's own ids taking precedence over the payload.
	pub fn into_candidate(self) -> Option<CandidateProduct> {
		let mut product = CandidateProduct::from_json(&self.product_data)?;
		let merchant_id = self.merchant_id.trim();
		let product_id = self.cache_product_id.trim();

		if merchant_id.is_empty() {
			return None;
		}
		if !product_id.is_empty() {
			product.product_id = product_id.to_string();
		}
		if product.product_id.is_empty() {
			return None;
		}

		product.merchant_id = Some(merchant_id.to_string());

		if product.source.is_none() {
			product.source = Some(DEFAULT_SOURCE_TYPE.to_string());
		}

		Some(product)
	}
}

pub async fn search_products(
	pool: &PgPool,
	query: &CatalogQuery<'_>,
) -> Result<Vec<CandidateProduct>> {
	if let Some(merchant_ids) = query.merchant_ids
		&& merchant_ids.is_empty()
	{
		return Err(Error::InvalidArgument(
			"merchant_ids must be non-empty when scoped.".to_string(),
		));
	}

	let tokens = query
		.tokens
		.iter()
		.map(|token| token.trim())
		.filter(|token| !token.is_empty())
		.take(MAX_QUERY_TOKENS)
		.collect::<Vec<_>>();

	if tokens.is_empty() {
		return Ok(Vec::new());
	}

	let timeout_ms = query.timeout_ms.clamp(MIN_STATEMENT_TIMEOUT_MS, MAX_STATEMENT_TIMEOUT_MS);
	let fetch_limit = query.fetch_limit();
	let mut builder = build_search_sql(query.merchant_ids, &tokens, fetch_limit);
	let mut tx = pool.begin().await?;

	// `SET` does not take bind parameters; the value is a clamped integer.
	sqlx::query(&format!("SET LOCAL statement_timeout = {timeout_ms}")).execute(&mut *tx).await?;

	let rows: Vec<CatalogRow> = builder.build_query_as().fetch_all(&mut *tx).await?;

	tx.commit().await?;

	let products = rows
		.into_iter()
		.filter_map(CatalogRow::into_candidate)
		.take(fetch_limit as usize)
		.collect::<Vec<_>>();

	tracing::debug!(
		scoped = query.merchant_ids.is_some(),
		tokens = tokens.len(),
		rows = products.len(),
		"Catalog search completed."
	);

	Ok(products)
}

fn build_search_sql<'a>(
	merchant_ids: Option<&[String]>,
	tokens: &[&str],
	fetch_limit: u32,
) -> QueryBuilder<'a, Postgres> {
	let mut builder = QueryBuilder::new(
		"\
WITH latest AS (
	SELECT DISTINCT ON (merchant_id, cache_product_id)
		merchant_id, cache_product_id, product_data, cached_at
	FROM (
		SELECT
			merchant_id,
			COALESCE(
				NULLIF(platform_product_id, ''),
				NULLIF(product_data->>'id', ''),
				NULLIF(product_data->>'product_id', ''),
				NULLIF(product_data->>'productId', '')
			) AS cache_product_id,
			product_data,
			cached_at
		FROM products_cache
		WHERE (expires_at IS NULL OR expires_at > now())
			AND COALESCE(lower(product_data->>'status'), 'active') = 'active'
			AND COALESCE(lower(product_data->>'orderable'), 'true') <> 'false'",
	);

	if let Some(merchant_ids) = merchant_ids {
		builder.push("\n\t\t\tAND merchant_id = ANY(");
		builder.push_bind(merchant_ids.to_vec());
		builder.push(")");
	}

	for token in tokens {
		let pattern = format!("%{token}%");
		let mut separated = builder.separated(" OR ");

		separated.push_unseparated("\n\t\t\tAND (");

		for field in MATCH_FIELDS {
			separated.push(format!("lower(coalesce(product_data->>'{field}', '')) LIKE "));
			separated.push_bind_unseparated(pattern.clone());
		}

		separated.push_unseparated(")");
	}

	builder.push(
		"
	) candidates
	WHERE cache_product_id IS NOT NULL
	ORDER BY merchant_id, cache_product_id, cached_at DESC
)
SELECT merchant_id, cache_product_id, product_data
FROM latest
ORDER BY cached_at DESC, merchant_id, cache_product_id
LIMIT ",
	);
	builder.push_bind(i64::from(fetch_limit));

	builder
}
