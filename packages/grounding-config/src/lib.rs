mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	BrandFamily, Budget, Config, Postgres, Resolver, Service, StageBudget, Storage, Upstream,
};

use std::{fs, path::Path};

pub const MIN_TIMEOUT_MS: u64 = 100;
pub const MAX_TIMEOUT_MS: u64 = 15_000;
pub const MAX_RETRIES: u32 = 3;
pub const MAX_RETRY_BACKOFF_MS: u64 = 2_000;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn from_toml_str(raw: &str) -> Result<Config> {
	let mut cfg: Config =
		toml::from_str(raw).map_err(|err| Error::ParseConfigStr { source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}

	if let Some(postgres) = cfg.storage.postgres.as_ref() {
		if postgres.dsn.trim().is_empty() {
			return Err(Error::Validation {
				message: "storage.postgres.dsn must be non-empty.".to_string(),
			});
		}
		if postgres.pool_max_conns == 0 {
			return Err(Error::Validation {
				message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
			});
		}
	}

	if cfg.upstream.api_key.is_some() && cfg.upstream.checkout_token.is_some() {
		return Err(Error::Validation {
			message: "upstream.api_key and upstream.checkout_token are mutually exclusive."
				.to_string(),
		});
	}
	if !cfg.upstream.search_path.starts_with('/') {
		return Err(Error::Validation {
			message: "upstream.search_path must start with '/'.".to_string(),
		});
	}
	if cfg.upstream.retries > MAX_RETRIES {
		return Err(Error::Validation {
			message: format!("upstream.retries must be {MAX_RETRIES} or less."),
		});
	}
	if cfg.upstream.retry_backoff_ms > MAX_RETRY_BACKOFF_MS {
		return Err(Error::Validation {
			message: format!("upstream.retry_backoff_ms must be {MAX_RETRY_BACKOFF_MS} or less."),
		});
	}

	let resolver = &cfg.resolver;

	if !matches!(resolver.scoring_version.as_str(), "v1" | "v2") {
		return Err(Error::Validation {
			message: "resolver.scoring_version must be one of v1 or v2.".to_string(),
		});
	}
	if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&resolver.timeout_ms) {
		return Err(Error::Validation {
			message: format!(
				"resolver.timeout_ms must be in the range {MIN_TIMEOUT_MS}-{MAX_TIMEOUT_MS}."
			),
		});
	}
	if !(1..=50).contains(&resolver.limit) {
		return Err(Error::Validation {
			message: "resolver.limit must be in the range 1-50.".to_string(),
		});
	}
	if !(1..=12).contains(&resolver.candidates_limit) {
		return Err(Error::Validation {
			message: "resolver.candidates_limit must be in the range 1-12.".to_string(),
		});
	}

	for (label, value) in [
		("resolver.v1_min_confidence", resolver.v1_min_confidence),
		("resolver.v2_min_confidence", resolver.v2_min_confidence),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if !(0.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	for (label, stage) in [
		("resolver.budget.scoped_catalog", resolver.budget.scoped_catalog),
		("resolver.budget.scoped_search", resolver.budget.scoped_search),
		("resolver.budget.global_catalog", resolver.budget.global_catalog),
		("resolver.budget.global_search", resolver.budget.global_search),
	] {
		if stage.floor_ms == 0 {
			return Err(Error::Validation {
				message: format!("{label}.floor_ms must be greater than zero."),
			});
		}
		if stage.cap_ms < stage.floor_ms {
			return Err(Error::Validation {
				message: format!("{label}.cap_ms must be greater than or equal to floor_ms."),
			});
		}
	}

	for family in &cfg.brands {
		if family.canonical.trim().is_empty() {
			return Err(Error::Validation {
				message: "brands.canonical must be non-empty.".to_string(),
			});
		}
		if family.aliases.iter().all(|alias| alias.trim().is_empty()) {
			return Err(Error::Validation {
				message: format!(
					"brands.aliases must contain a non-empty alias for {}.",
					family.canonical
				),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.upstream.api_base.as_deref().map(|base| base.trim().is_empty()).unwrap_or(false) {
		cfg.upstream.api_base = None;
	}
	if let Some(base) = cfg.upstream.api_base.as_mut() {
		let trimmed = base.trim().trim_end_matches('/').to_string();

		*base = trimmed;
	}
	if cfg.upstream.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.upstream.api_key = None;
	}
	if cfg.upstream.checkout_token.as_deref().map(|token| token.trim().is_empty()).unwrap_or(false)
	{
		cfg.upstream.checkout_token = None;
	}

	cfg.resolver.scoring_version = cfg.resolver.scoring_version.trim().to_lowercase();
}
