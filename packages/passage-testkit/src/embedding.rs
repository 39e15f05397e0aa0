use std::{
	collections::HashMap,
	sync::atomic::{AtomicUsize, Ordering},
};

use passage_providers::{BoxFuture, EmbeddingProvider, Error, Result};

/// Bag-of-words embedding: every lowercase word is hashed into one dimension.
///
/// Texts sharing words get similar vectors, which is enough for ranking tests.
pub struct HashEmbedding {
	dimensions: usize,
	calls: AtomicUsize,
}
impl HashEmbedding {
	pub fn new(dimensions: usize) -> Self {
		Self { dimensions, calls: AtomicUsize::new(0) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn vector(&self, text: &str) -> Vec<f32> {
		hashed_vector(text, self.dimensions)
	}
}
impl EmbeddingProvider for HashEmbedding {
	fn embed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Ok(texts.iter().map(|text| self.vector(text)).collect())
		})
	}

	fn model(&self) -> &str {
		"hash"
	}

	fn dimensions(&self) -> usize {
		self.dimensions
	}
}

/// Returns preset vectors per text and `fallback` for anything else.
pub struct FixedEmbedding {
	vectors: HashMap<String, Vec<f32>>,
	fallback: Vec<f32>,
	calls: AtomicUsize,
}
impl FixedEmbedding {
	pub fn new(fallback: Vec<f32>) -> Self {
		Self { vectors: HashMap::new(), fallback, calls: AtomicUsize::new(0) }
	}

	pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
		self.vectors.insert(text.to_string(), vector);

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl EmbeddingProvider for FixedEmbedding {
	fn embed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);
			// Yields so concurrent callers interleave.
			tokio::task::yield_now().await;

			Ok(texts
				.iter()
				.map(|text| self.vectors.get(text).cloned().unwrap_or_else(|| self.fallback.clone()))
				.collect())
		})
	}

	fn model(&self) -> &str {
		"fixed"
	}

	fn dimensions(&self) -> usize {
		self.fallback.len()
	}
}

/// Always fails, counting attempts.
pub struct FailingEmbedding {
	dimensions: usize,
	calls: AtomicUsize,
}
impl FailingEmbedding {
	pub fn new(dimensions: usize) -> Self {
		Self { dimensions, calls: AtomicUsize::new(0) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl EmbeddingProvider for FailingEmbedding {
	fn embed<'a>(&'a self, _: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Err(Error::InvalidResponse { message: "Embedding backend is down.".to_string() })
		})
	}

	fn model(&self) -> &str {
		"failing"
	}

	fn dimensions(&self) -> usize {
		self.dimensions
	}
}

pub fn hashed_vector(text: &str, dimensions: usize) -> Vec<f32> {
	let mut vector = vec![0.0_f32; dimensions.max(1)];

	for word in text.split(|ch: char| !ch.is_alphanumeric()).filter(|word| !word.is_empty()) {
		let hash = blake3::hash(word.to_lowercase().as_bytes());
		let bytes = hash.as_bytes();
		let slot = u64::from_le_bytes([
			bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
		]);

		let len = vector.len() as u64;

		vector[(slot % len) as usize] += 1.0;
	}

	let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();

	if norm > 0.0 {
		for value in &mut vector {
			*value /= norm;
		}
	}

	vector
}
