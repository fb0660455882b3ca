use reqwest::StatusCode;

use grounding_domain::SourceFailureReason;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("Upstream responded with status {status}.")]
	Status { status: u16 },
}
impl Error {
	/// Rate limiting, server errors, timeouts and transport failures are worth another attempt.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Reqwest(err) => !err.is_decode() && !err.is_builder(),
			Self::Status { status } =>
				*status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500,
			Self::SerdeJson(_) | Self::InvalidHeaderValue(_) | Self::InvalidConfig { .. } => false,
		}
	}

	pub fn failure_reason(&self) -> SourceFailureReason {
		match self {
			Self::Reqwest(err) if err.is_timeout() => SourceFailureReason::UpstreamTimeout,
			Self::Status { status } => SourceFailureReason::UpstreamStatus(*status),
			Self::InvalidConfig { .. } => SourceFailureReason::UpstreamNotConfigured,
			_ => SourceFailureReason::UpstreamError,
		}
	}
}
