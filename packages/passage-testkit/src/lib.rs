pub mod embedding;
pub mod memory;

mod error;

pub use embedding::{FailingEmbedding, FixedEmbedding, HashEmbedding, hashed_vector};
pub use error::{Error, Result};
pub use memory::{MemoryIndex, chunk, chunk_payload};

use std::{env, thread, time::Duration};

use qdrant_client::Qdrant;
use tokio::{runtime::Builder, time};
use uuid::Uuid;

use passage_config::Config;

const BASE_CONFIG: &str = r#"
[service]
http_bind = "127.0.0.1:0"
log_level = "warn"

[storage.qdrant]
url        = "http://127.0.0.1:6334"
collection = "passages_test"
vector_dim = {dim}
timeout_ms = 2000

[providers.embedding]
provider_id = "test"
api_base    = "http://127.0.0.1:9"
path        = "/v1/embeddings"
model       = "test"
dimensions  = {dim}
timeout_ms  = 2000
"#;

/// A validated configuration for `dim`-dimensional vectors with every optional section at its
/// default. `extra` is appended verbatim, so it may add tables the base leaves out.
pub fn test_config_with(dim: usize, extra: &str) -> Result<Config> {
	let raw = format!("{}\n{extra}", BASE_CONFIG.replace("{dim}", &dim.to_string()));

	Ok(passage_config::parse(&raw)?)
}

pub fn test_config(dim: usize) -> Result<Config> {
	test_config_with(dim, "")
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("PASSAGE_QDRANT_URL").ok()
}

/// A uniquely named Qdrant collection that is deleted on cleanup or drop.
pub struct TestCollection {
	url: String,
	name: String,
	cleaned: bool,
}
impl TestCollection {
	pub fn new(url: &str, prefix: &str) -> Self {
		Self {
			url: url.to_string(),
			name: format!("{prefix}_{}", Uuid::new_v4().simple()),
			cleaned: false,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	pub async fn cleanup(mut self) -> Result<()> {
		self.cleaned = true;

		delete_collection(&self.url, &self.name).await
	}
}
impl Drop for TestCollection {
	fn drop(&mut self) {
		if self.cleaned {
			return;
		}

		let url = self.url.clone();
		let name = self.name.clone();
		let cleanup_thread = thread::spawn(move || {
			let runtime = match Builder::new_current_thread().enable_all().build() {
				Ok(runtime) => runtime,
				Err(err) => {
					eprintln!("Test collection cleanup failed: {err}.");

					return;
				},
			};

			if let Err(err) = runtime.block_on(delete_collection(&url, &name)) {
				eprintln!("Test collection cleanup failed: {err}.");
			}
		});
		let _ = cleanup_thread.join();
	}
}

async fn delete_collection(url: &str, name: &str) -> Result<()> {
	let client = Qdrant::from_url(url)
		.build()
		.map_err(|err| Error::Message(format!("Failed to build Qdrant client: {err}.")))?;
	let exists = time::timeout(Duration::from_secs(10), client.collection_exists(name.to_string()))
		.await
		.map_err(|_| Error::Message("Qdrant collection_exists timed out.".to_string()))??;

	if !exists {
		return Ok(());
	}

	time::timeout(Duration::from_secs(10), client.delete_collection(name.to_string()))
		.await
		.map_err(|_| Error::Message(format!("Timed out deleting Qdrant collection {name:?}.")))??;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_config_validates() {
		let cfg = test_config(8).expect("Test config must be valid.");

		assert_eq!(cfg.storage.qdrant.vector_dim, 8);
		assert_eq!(cfg.providers.embedding.dimensions, 8);
	}

	#[test]
	fn hashed_vectors_are_unit_length() {
		let vector = hashed_vector("кратчайший путь в графе", 16);
		let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();

		assert!((norm - 1.0).abs() < 1e-5);
	}
}
