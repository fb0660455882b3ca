pub mod budget;
pub mod hints;
pub mod rank;
pub mod resolve;
pub mod scoring;

mod error;

pub use error::{Error, Result};
pub use hints::ResolveHints;
pub use rank::{Decision, DecisionReason};
pub use resolve::{
	CandidateSummary, ResolveMetadata, ResolveOptions, ResolveRequest, ResolveResponse,
	SourceDiagnostic,
};
pub use scoring::{ScoreReason, ScoringVersion};

use std::{future::Future, pin::Pin, sync::Arc};

use tracing_subscriber::EnvFilter;

use grounding_config::Config;
use grounding_domain::{BrandIndex, SourceFailure, SourceFailureReason, SourceResult};
use grounding_providers::search::{AgentSearchClient, SearchRequest};
use grounding_storage::{
	catalog::{self, CatalogQuery},
	db::Db,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Sellable-product store lookup.
pub trait CatalogSource
where
	Self: Send + Sync,
{
	fn search<'a>(&'a self, query: CatalogQuery<'a>) -> BoxFuture<'a, SourceResult>;
}

/// Upstream product search.
pub trait SearchSource
where
	Self: Send + Sync,
{
	fn search<'a>(&'a self, req: SearchRequest<'a>) -> BoxFuture<'a, SourceResult>;
}

/// Candidate sources wired into a service. `None` marks a source as not configured.
#[derive(Clone, Default)]
pub struct Sources {
	pub catalog: Option<Arc<dyn CatalogSource>>,
	pub search: Option<Arc<dyn SearchSource>>,
}
impl Sources {
	pub fn new(
		catalog: Option<Arc<dyn CatalogSource>>,
		search: Option<Arc<dyn SearchSource>>,
	) -> Self {
		Self { catalog, search }
	}
}

pub struct PgCatalog {
	db: Db,
}
impl PgCatalog {
	pub fn new(db: Db) -> Self {
		Self { db }
	}

	async fn run(&self, query: CatalogQuery<'_>) -> SourceResult {
		match catalog::search_products(&self.db.pool, &query).await {
			Ok(products) => Ok(grounding_domain::SourceBatch { products, attempts: 1 }),
			Err(err) => {
				let reason = if err.is_undefined_table() {
					SourceFailureReason::TableMissing
				} else if err.is_statement_timeout() {
					SourceFailureReason::DbTimeout
				} else if matches!(err, grounding_storage::Error::InvalidArgument(_)) {
					SourceFailureReason::MerchantIdsMissing
				} else {
					SourceFailureReason::DbError
				};

				tracing::warn!(error = %err, %reason, "Catalog lookup failed.");

				Err(SourceFailure::new(reason, 1))
			},
		}
	}
}
impl CatalogSource for PgCatalog {
	fn search<'a>(&'a self, query: CatalogQuery<'a>) -> BoxFuture<'a, SourceResult> {
		Box::pin(self.run(query))
	}
}

impl SearchSource for AgentSearchClient {
	fn search<'a>(&'a self, req: SearchRequest<'a>) -> BoxFuture<'a, SourceResult> {
		Box::pin(async move { AgentSearchClient::search(self, &req).await })
	}
}

pub struct GroundingService {
	pub cfg: Config,
	pub brands: BrandIndex,
	pub sources: Sources,
}
impl GroundingService {
	/// Wires the default Postgres catalog and upstream search client for whichever of the two
	/// the config enables.
	pub fn new(cfg: Config) -> Result<Self> {
		let catalog = match cfg.storage.postgres.as_ref() {
			Some(postgres) => {
				let db = Db::connect(postgres)?;

				Some(Arc::new(PgCatalog::new(db)) as Arc<dyn CatalogSource>)
			},
			None => None,
		};
		let search = match cfg.upstream.api_base {
			Some(_) => {
				let client = AgentSearchClient::new(&cfg.upstream)?;

				Some(Arc::new(client) as Arc<dyn SearchSource>)
			},
			None => None,
		};

		tracing::info!(
			catalog = catalog.is_some(),
			search = search.is_some(),
			"Grounding service initialized."
		);

		Ok(Self::with_sources(cfg, Sources::new(catalog, search)))
	}

	pub fn with_sources(cfg: Config, sources: Sources) -> Self {
		let brands = BrandIndex::with_families(&cfg.brands);

		Self { cfg, brands, sources }
	}
}

/// Installs a global fmt subscriber filtered by `service.log_level`. Fails if one is already set.
pub fn init_tracing(cfg: &grounding_config::Service) -> Result<()> {
	let filter = EnvFilter::try_new(&cfg.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.try_init()
		.map_err(|err| Error::Tracing { message: err.to_string() })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tracing_can_only_be_installed_once() {
		let cfg = grounding_config::Service { log_level: "not a filter [".to_string() };
		let _ = init_tracing(&cfg);

		assert!(matches!(init_tracing(&cfg), Err(Error::Tracing { .. })));
	}
}
