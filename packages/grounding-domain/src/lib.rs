pub mod brand;
pub mod product;
pub mod signals;
pub mod source;
pub mod text;

pub use brand::BrandIndex;
pub use product::{CandidateProduct, ProductRef};
pub use signals::{Signals, extract_signals};
pub use source::{SourceBatch, SourceFailure, SourceFailureReason, SourceResult};

use serde::{Deserialize, Deserializer, Serialize};

/// Caller language tag. Only echoed back in metadata; normalization is script-aware on its own.
///
/// Decoding is lenient: `cn` in any case selects [`Lang::Cn`], anything else falls back to
/// [`Lang::En`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
	#[default]
	En,
	Cn,
}
impl Lang {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::En => "en",
			Self::Cn => "cn",
		}
	}
}
impl<'de> Deserialize<'de> for Lang {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = Option::<String>::deserialize(deserializer)?;

		match raw.as_deref().map(str::trim) {
			Some(tag) if tag.eq_ignore_ascii_case("cn") => Ok(Self::Cn),
			_ => Ok(Self::En),
		}
	}
}
