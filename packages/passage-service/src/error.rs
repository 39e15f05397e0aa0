pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Query must contain non-whitespace text.")]
	EmptyQuery,
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Vector index unavailable: {message}")]
	IndexUnavailable { message: String },
	#[error("Embedding backend unavailable: {message}")]
	EmbeddingUnavailable { message: String },
}
impl Error {
	/// Whether the same request may succeed when sent again.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::IndexUnavailable { .. } | Self::EmbeddingUnavailable { .. })
	}
}

impl From<passage_storage::Error> for Error {
	fn from(err: passage_storage::Error) -> Self {
		match err {
			passage_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			passage_storage::Error::NotFound(message)
			| passage_storage::Error::Unavailable(message) => Self::IndexUnavailable { message },
			passage_storage::Error::Qdrant(inner) =>
				Self::IndexUnavailable { message: inner.to_string() },
		}
	}
}

impl From<passage_providers::Error> for Error {
	fn from(err: passage_providers::Error) -> Self {
		Self::EmbeddingUnavailable { message: err.to_string() }
	}
}
