use std::{sync::Arc, time::Duration};

use tokio::sync::OnceCell;

use crate::{Error, Result};
use passage_providers::EmbeddingProvider;

const PROBE_TEXT: &str = "probe";

#[derive(Clone, Debug)]
pub struct BackendInfo {
	pub model: String,
	pub dimensions: usize,
}

/// Shared handle to the embedding model.
///
/// The first caller probes the provider and checks its dimensionality; concurrent first calls
/// wait on the same probe. A failed probe leaves the handle uninitialized so a later call can
/// try again.
pub struct EmbeddingBackend {
	provider: Arc<dyn EmbeddingProvider>,
	expected_dim: usize,
	timeout: Duration,
	ready: OnceCell<BackendInfo>,
}
impl EmbeddingBackend {
	pub fn new(provider: Arc<dyn EmbeddingProvider>, expected_dim: usize, timeout: Duration) -> Self {
		Self { provider, expected_dim, timeout, ready: OnceCell::new() }
	}

	pub fn model(&self) -> &str {
		self.provider.model()
	}

	pub async fn ensure_ready(&self) -> Result<&BackendInfo> {
		self.ready
			.get_or_try_init(|| async {
				let probe = vec![PROBE_TEXT.to_string()];
				let vectors = self.call(&probe).await?;
				let dimensions = vectors.first().map(Vec::len).unwrap_or(0);

				if dimensions != self.expected_dim {
					return Err(Error::EmbeddingUnavailable {
						message: format!(
							"Model returned {dimensions} dimensions, expected {}.",
							self.expected_dim
						),
					});
				}

				tracing::info!(model = self.provider.model(), dimensions, "Embedding backend ready.");

				Ok(BackendInfo { model: self.provider.model().to_string(), dimensions })
			})
			.await
	}

	pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		if texts.is_empty() {
			return Ok(Vec::new());
		}

		let dimensions = self.ensure_ready().await?.dimensions;
		let vectors = self.call(texts).await?;

		if vectors.len() != texts.len() {
			return Err(Error::EmbeddingUnavailable {
				message: format!("Got {} vectors for {} inputs.", vectors.len(), texts.len()),
			});
		}
		if vectors.iter().any(|vector| vector.len() != dimensions) {
			return Err(Error::EmbeddingUnavailable {
				message: "Model returned a vector with unexpected dimensions.".to_string(),
			});
		}

		Ok(vectors)
	}

	pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
		let mut vectors = self.embed(&[text.to_string()]).await?;

		vectors.pop().ok_or_else(|| Error::EmbeddingUnavailable {
			message: "Model returned no vector.".to_string(),
		})
	}

	async fn call(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		match tokio::time::timeout(self.timeout, self.provider.embed(texts)).await {
			Ok(result) => Ok(result?),
			Err(_) => Err(Error::EmbeddingUnavailable {
				message: format!("Timed out after {} ms.", self.timeout.as_millis()),
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	use tokio::task::JoinSet;

	use super::*;
	use passage_testkit::FixedEmbedding;

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_first_use_checks_dimensions_once() {
		let provider = Arc::new(FixedEmbedding::new(vec![1.0, 0.0, 0.0]));
		let backend =
			Arc::new(EmbeddingBackend::new(provider.clone(), 3, Duration::from_secs(5)));
		let mut tasks = JoinSet::new();

		for i in 0..8 {
			let backend = Arc::clone(&backend);

			tasks.spawn(async move { backend.embed_query(&format!("query {i}")).await });
		}

		while let Some(joined) = tasks.join_next().await {
			let vector = joined.expect("Embed task panicked.").expect("Embedding must succeed.");

			assert_eq!(vector.len(), 3);
		}

		assert_eq!(provider.calls(), 9);
	}

	#[tokio::test]
	async fn wrong_dimensions_fail_first_use() {
		let provider = Arc::new(FixedEmbedding::new(vec![1.0, 0.0]));
		let backend = EmbeddingBackend::new(provider.clone(), 3, Duration::from_secs(5));
		let err = backend.embed_query("граф").await.expect_err("Mismatched dimensions must fail.");

		assert!(matches!(err, Error::EmbeddingUnavailable { .. }));
		assert_eq!(provider.calls(), 1);
	}
}
