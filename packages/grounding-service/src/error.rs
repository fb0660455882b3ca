pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Construction-time failures. Resolution itself never fails.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Config(#[from] grounding_config::Error),
	#[error(transparent)]
	Storage(#[from] grounding_storage::Error),
	#[error(transparent)]
	Provider(#[from] grounding_providers::Error),
	#[error("Tracing error: {message}")]
	Tracing { message: String },
}
