use std::{future::Future, pin::Pin};

use crate::{
	Result,
	models::{Candidate, Chunk, CollectionInfo, Distance, IndexPoint, PointKey, SearchQuery},
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Vector index holding chunk points.
pub trait ChunkIndex
where
	Self: Send + Sync,
{
	fn collection(&self) -> &str;

	fn distance(&self) -> Distance;

	fn vector_dim(&self) -> usize;

	/// Nearest chunks to `query.vector`, best first.
	fn search<'a>(&'a self, query: &'a SearchQuery) -> BoxFuture<'a, Result<Vec<Candidate>>>;

	/// Chunks of `source` with positions in `first..=last`, ordered by position.
	fn neighbors<'a>(
		&'a self,
		source: &'a str,
		first: i64,
		last: i64,
	) -> BoxFuture<'a, Result<Vec<Chunk>>>;

	fn upsert<'a>(&'a self, points: Vec<IndexPoint>) -> BoxFuture<'a, Result<()>>;

	fn delete<'a>(&'a self, ids: Vec<PointKey>) -> BoxFuture<'a, Result<()>>;

	/// Creates the collection when missing. Returns whether it was created.
	fn ensure_collection(&self) -> BoxFuture<'_, Result<bool>>;

	fn collection_info(&self) -> BoxFuture<'_, Result<CollectionInfo>>;
}
