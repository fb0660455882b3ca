use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	#[serde(default)]
	pub storage: Storage,
	#[serde(default)]
	pub upstream: Upstream,
	#[serde(default)]
	pub resolver: Resolver,
	/// Optional. Extra brand families merged into the builtin alias table.
	#[serde(default)]
	pub brands: Vec<BrandFamily>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
	/// Optional. When absent the catalog stages report `db_not_configured`.
	pub postgres: Option<Postgres>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	#[serde(default = "default_pool_max_conns")]
	pub pool_max_conns: u32,
	#[serde(default = "default_acquire_timeout_ms")]
	pub acquire_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Upstream {
	/// Optional. When absent the search stages report `upstream_not_configured`.
	pub api_base: Option<String>,
	#[serde(default = "default_search_path")]
	pub search_path: String,
	/// Mutually exclusive with `checkout_token`.
	pub api_key: Option<String>,
	pub checkout_token: Option<String>,
	#[serde(default = "default_retries")]
	pub retries: u32,
	#[serde(default = "default_retry_backoff_ms")]
	pub retry_backoff_ms: u64,
}
impl Default for Upstream {
	fn default() -> Self {
		Self {
			api_base: None,
			search_path: default_search_path(),
			api_key: None,
			checkout_token: None,
			retries: default_retries(),
			retry_backoff_ms: default_retry_backoff_ms(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Resolver {
	#[serde(default = "default_scoring_version")]
	pub scoring_version: String,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default = "default_limit")]
	pub limit: u32,
	#[serde(default = "default_candidates_limit")]
	pub candidates_limit: u32,
	#[serde(default = "default_v1_min_confidence")]
	pub v1_min_confidence: f32,
	#[serde(default = "default_v2_min_confidence")]
	pub v2_min_confidence: f32,
	#[serde(default)]
	pub budget: Budget,
}
impl Default for Resolver {
	fn default() -> Self {
		Self {
			scoring_version: default_scoring_version(),
			timeout_ms: default_timeout_ms(),
			limit: default_limit(),
			candidates_limit: default_candidates_limit(),
			v1_min_confidence: default_v1_min_confidence(),
			v2_min_confidence: default_v2_min_confidence(),
			budget: Budget::default(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Budget {
	#[serde(default = "default_scoped_catalog")]
	pub scoped_catalog: StageBudget,
	#[serde(default = "default_scoped_search")]
	pub scoped_search: StageBudget,
	#[serde(default = "default_global_catalog")]
	pub global_catalog: StageBudget,
	#[serde(default = "default_global_search")]
	pub global_search: StageBudget,
}
impl Default for Budget {
	fn default() -> Self {
		Self {
			scoped_catalog: default_scoped_catalog(),
			scoped_search: default_scoped_search(),
			global_catalog: default_global_catalog(),
			global_search: default_global_search(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StageBudget {
	/// Upper bound on the time a stage may use.
	pub cap_ms: u64,
	/// Below this much remaining time the stage is skipped.
	pub floor_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrandFamily {
	pub canonical: String,
	pub aliases: Vec<String>,
}

fn default_pool_max_conns() -> u32 {
	4
}

fn default_acquire_timeout_ms() -> u64 {
	250
}

fn default_search_path() -> String {
	"/agent/v1/products/search".to_string()
}

fn default_retries() -> u32 {
	1
}

fn default_retry_backoff_ms() -> u64 {
	120
}

fn default_scoring_version() -> String {
	"v2".to_string()
}

fn default_timeout_ms() -> u64 {
	800
}

fn default_limit() -> u32 {
	20
}

fn default_candidates_limit() -> u32 {
	6
}

fn default_v1_min_confidence() -> f32 {
	0.72
}

fn default_v2_min_confidence() -> f32 {
	0.68
}

fn default_scoped_catalog() -> StageBudget {
	StageBudget { cap_ms: 300, floor_ms: 50 }
}

fn default_scoped_search() -> StageBudget {
	StageBudget { cap_ms: 400, floor_ms: 80 }
}

fn default_global_catalog() -> StageBudget {
	StageBudget { cap_ms: 300, floor_ms: 60 }
}

fn default_global_search() -> StageBudget {
	StageBudget { cap_ms: 1_200, floor_ms: 120 }
}
