pub mod embedding;
pub mod health;
pub mod ingest;
pub mod rag;
pub mod search;

mod error;
mod time_serde;

pub use embedding::{BackendInfo, EmbeddingBackend};
pub use error::{Error, Result};
pub use health::{HealthReport, HealthStatus};
pub use ingest::{
	DeleteRequest, DeleteResponse, EmbedRequest, EmbedResponse, EnsureCollectionResponse,
	UpsertPoint, UpsertRequest, UpsertResponse,
};
pub use rag::{RagCitation, RagContext, RagRequest, RagResponse, RagSegment};
pub use search::{
	PipelineStage, RetrievalTrace, SearchHit, SearchRequest, SearchResponse, SessionContext,
	ranking::query::RankingOverride,
};

use std::{sync::Arc, time::Duration};

use passage_config::Config;
use passage_domain::tokenize::TokenizerOptions;
use passage_providers::{EmbeddingProvider, embedding::HttpEmbedding};
use passage_storage::{BoxFuture, ChunkIndex, qdrant::QdrantStore};

pub struct PassageService {
	pub cfg: Config,
	pub index: Arc<dyn ChunkIndex>,
	pub embedding: Arc<EmbeddingBackend>,
	pub(crate) tokenizer: TokenizerOptions,
}
impl PassageService {
	pub fn new(
		cfg: Config,
		index: Arc<dyn ChunkIndex>,
		embedding: Arc<dyn EmbeddingProvider>,
	) -> Self {
		let backend = EmbeddingBackend::new(
			embedding,
			cfg.providers.embedding.dimensions as usize,
			Duration::from_millis(cfg.providers.embedding.timeout_ms),
		);
		let tokenizer = TokenizerOptions::from_config(&cfg.tokenizer);

		Self { cfg, index, embedding: Arc::new(backend), tokenizer }
	}

	/// Wires the Qdrant index and the HTTP embedding provider named in `cfg`.
	pub fn from_config(cfg: Config) -> Result<Self> {
		let index = QdrantStore::new(&cfg.storage.qdrant)?;
		let embedding = HttpEmbedding::new(&cfg.providers.embedding)?;

		Ok(Self::new(cfg, Arc::new(index), Arc::new(embedding)))
	}

	pub(crate) fn index_timeout(&self) -> Duration {
		Duration::from_millis(self.cfg.storage.qdrant.timeout_ms)
	}
}

/// Awaits an index call under `timeout`, mapping expiry to a retryable error.
pub(crate) async fn index_call<T>(
	timeout: Duration,
	call: BoxFuture<'_, passage_storage::Result<T>>,
) -> Result<T> {
	match tokio::time::timeout(timeout, call).await {
		Ok(result) => Ok(result?),
		Err(_) => Err(Error::IndexUnavailable {
			message: format!("Timed out after {} ms.", timeout.as_millis()),
		}),
	}
}
