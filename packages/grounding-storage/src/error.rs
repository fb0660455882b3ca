const UNDEFINED_TABLE: &str = "42P01";
const QUERY_CANCELED: &str = "57014";

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
}
impl Error {
	/// The catalog table does not exist in the connected database.
	pub fn is_undefined_table(&self) -> bool {
		self.has_sqlstate(UNDEFINED_TABLE)
	}

	/// The statement was cancelled by `statement_timeout`.
	pub fn is_statement_timeout(&self) -> bool {
		self.has_sqlstate(QUERY_CANCELED)
	}

	fn has_sqlstate(&self, expected: &str) -> bool {
		match self {
			Self::Sqlx(sqlx::Error::Database(err)) => err.code().as_deref() == Some(expected),
			_ => false,
		}
	}
}
