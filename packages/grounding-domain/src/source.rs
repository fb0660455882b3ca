use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::product::CandidateProduct;

pub type SourceResult = Result<SourceBatch, SourceFailure>;

/// Why a candidate source produced nothing usable. The wire strings are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFailureReason {
	NoResults,
	BudgetExhausted,
	MerchantIdsMissing,
	DbNotConfigured,
	DbError,
	DbTimeout,
	TableMissing,
	UpstreamNotConfigured,
	UpstreamTimeout,
	UpstreamError,
	UpstreamStatus(u16),
}
impl SourceFailureReason {
	/// Whether the source itself was degraded, as opposed to healthy but empty or skipped.
	pub fn is_degraded(self) -> bool {
		!matches!(self, Self::NoResults | Self::BudgetExhausted | Self::MerchantIdsMissing)
	}

	fn as_static(self) -> Option<&'static str> {
		let value = match self {
			Self::NoResults => "no_results",
			Self::BudgetExhausted => "budget_exhausted",
			Self::MerchantIdsMissing => "merchant_ids_missing",
			Self::DbNotConfigured => "db_not_configured",
			Self::DbError => "db_error",
			Self::DbTimeout => "db_timeout",
			Self::TableMissing => "table_missing",
			Self::UpstreamNotConfigured => "upstream_not_configured",
			Self::UpstreamTimeout => "upstream_timeout",
			Self::UpstreamError => "upstream_error",
			Self::UpstreamStatus(_) => return None,
		};

		Some(value)
	}
}
impl fmt::Display for SourceFailureReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::UpstreamStatus(code) => write!(f, "upstream_status_{code}"),
			other => f.write_str(other.as_static().unwrap_or_default()),
		}
	}
}
impl FromStr for SourceFailureReason {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		let reason = match raw {
			"no_results" => Self::NoResults,
			"budget_exhausted" => Self::BudgetExhausted,
			"merchant_ids_missing" => Self::MerchantIdsMissing,
			"db_not_configured" => Self::DbNotConfigured,
			"db_error" => Self::DbError,
			"db_timeout" => Self::DbTimeout,
			"table_missing" => Self::TableMissing,
			"upstream_not_configured" => Self::UpstreamNotConfigured,
			"upstream_timeout" => Self::UpstreamTimeout,
			"upstream_error" => Self::UpstreamError,
			other => other
				.strip_prefix("upstream_status_")
				.and_then(|code| code.parse::<u16>().ok())
				.map(Self::UpstreamStatus)
				.ok_or_else(|| format!("Unknown source failure reason: {other}."))?,
		};

		Ok(reason)
	}
}
impl Serialize for SourceFailureReason {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.collect_str(self)
	}
}
impl<'de> Deserialize<'de> for SourceFailureReason {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		raw.parse().map_err(serde::de::Error::custom)
	}
}

/// A complete batch from one source call.
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
	pub products: Vec<CandidateProduct>,
	pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFailure {
	pub reason: SourceFailureReason,
	pub attempts: u32,
}
impl SourceFailure {
	pub fn new(reason: SourceFailureReason, attempts: u32) -> Self {
		Self { reason, attempts }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn wire_strings_parse_back() {
		for reason in [
			SourceFailureReason::NoResults,
			SourceFailureReason::BudgetExhausted,
			SourceFailureReason::DbTimeout,
			SourceFailureReason::TableMissing,
			SourceFailureReason::UpstreamStatus(503),
		] {
			assert_eq!(reason.to_string().parse::<SourceFailureReason>(), Ok(reason));
		}

		assert_eq!(SourceFailureReason::UpstreamStatus(429).to_string(), "upstream_status_429");
		assert!("upstream_status_abc".parse::<SourceFailureReason>().is_err());
	}

	#[test]
	fn serializes_as_plain_string() {
		let value = serde_json::to_value(SourceFailureReason::DbNotConfigured)
			.expect("Failed to serialize reason.");

		assert_eq!(value, serde_json::json!("db_not_configured"));
	}
}
