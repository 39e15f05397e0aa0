use std::{
	collections::BTreeMap,
	sync::{
		Mutex, MutexGuard,
		atomic::{AtomicBool, Ordering},
	},
};

use serde_json::{Map, Value};

use passage_storage::{
	BoxFuture, ChunkIndex, Error, Result,
	models::{Candidate, Chunk, CollectionInfo, Distance, IndexPoint, PointKey, SearchQuery},
	payload::{self, POSITION_KEY, SOURCE_KEY, TEXT_KEY, TITLE_KEY},
};

#[derive(Default)]
struct MemoryState {
	exists: bool,
	points: BTreeMap<String, IndexPoint>,
	search_limits: Vec<u64>,
}

/// Brute-force cosine index with switchable failures.
pub struct MemoryIndex {
	collection: String,
	vector_dim: usize,
	state: Mutex<MemoryState>,
	unreachable: AtomicBool,
	fail_filtered_search: AtomicBool,
	fail_neighbors: AtomicBool,
}
impl MemoryIndex {
	/// An index whose collection does not exist yet.
	pub fn new(collection: &str, vector_dim: usize) -> Self {
		Self {
			collection: collection.to_string(),
			vector_dim,
			state: Mutex::new(MemoryState::default()),
			unreachable: AtomicBool::new(false),
			fail_filtered_search: AtomicBool::new(false),
			fail_neighbors: AtomicBool::new(false),
		}
	}

	/// An index with an existing, empty collection.
	pub fn empty(collection: &str, vector_dim: usize) -> Self {
		let index = Self::new(collection, vector_dim);

		index.lock().exists = true;

		index
	}

	pub fn insert(&self, chunk: &Chunk, vector: Vec<f32>) {
		let point = IndexPoint {
			id: PointKey::Text(chunk.id.clone()),
			vector,
			payload: chunk_payload(chunk),
		};
		let mut state = self.lock();

		state.exists = true;
		state.points.insert(chunk.id.clone(), point);
	}

	pub fn len(&self) -> usize {
		self.lock().points.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn contains(&self, id: &str) -> bool {
		self.lock().points.contains_key(id)
	}

	pub fn payload(&self, id: &str) -> Option<Map<String, Value>> {
		self.lock().points.get(id).map(|point| point.payload.clone())
	}

	/// Limits of every unfiltered search, in call order.
	pub fn search_limits(&self) -> Vec<u64> {
		self.lock().search_limits.clone()
	}

	/// Makes every call fail as if the index could not be reached.
	pub fn set_unreachable(&self, value: bool) {
		self.unreachable.store(value, Ordering::SeqCst);
	}

	pub fn set_fail_filtered_search(&self, value: bool) {
		self.fail_filtered_search.store(value, Ordering::SeqCst);
	}

	pub fn set_fail_neighbors(&self, value: bool) {
		self.fail_neighbors.store(value, Ordering::SeqCst);
	}

	fn lock(&self) -> MutexGuard<'_, MemoryState> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn check_reachable(&self) -> Result<()> {
		if self.unreachable.load(Ordering::SeqCst) {
			return Err(Error::Unavailable("Memory index is unreachable.".to_string()));
		}

		Ok(())
	}

	fn run_search(&self, query: &SearchQuery) -> Result<Vec<Candidate>> {
		self.check_reachable()?;

		if query.source.is_some() && self.fail_filtered_search.load(Ordering::SeqCst) {
			return Err(Error::Unavailable("Filtered search failed.".to_string()));
		}

		let mut state = self.lock();

		if query.source.is_none() {
			state.search_limits.push(query.limit);
		}

		let mut out: Vec<Candidate> = state
			.points
			.iter()
			.filter_map(|(id, point)| {
				let chunk = payload::chunk_from_json(id.clone(), &point.payload)?;

				if query.source.as_ref().is_some_and(|source| source != &chunk.source) {
					return None;
				}

				let similarity = cosine(&query.vector, &point.vector);

				if query.score_threshold.is_some_and(|threshold| similarity < threshold) {
					return None;
				}

				Some(Candidate { chunk, similarity })
			})
			.collect();

		out.sort_by(|a, b| {
			b.similarity
				.partial_cmp(&a.similarity)
				.unwrap_or(std::cmp::Ordering::Equal)
				.then_with(|| a.chunk.id.cmp(&b.chunk.id))
		});
		out.truncate(query.limit as usize);

		Ok(out)
	}

	fn run_neighbors(&self, source: &str, first: i64, last: i64) -> Result<Vec<Chunk>> {
		self.check_reachable()?;

		if self.fail_neighbors.load(Ordering::SeqCst) {
			return Err(Error::Unavailable("Neighbor fetch failed.".to_string()));
		}

		let state = self.lock();
		let mut out: Vec<Chunk> = state
			.points
			.iter()
			.filter_map(|(id, point)| payload::chunk_from_json(id.clone(), &point.payload))
			.filter(|chunk| chunk.source == source && (first..=last).contains(&chunk.position))
			.collect();

		out.sort_by_key(|chunk| chunk.position);

		Ok(out)
	}
}
impl ChunkIndex for MemoryIndex {
	fn collection(&self) -> &str {
		&self.collection
	}

	fn distance(&self) -> Distance {
		Distance::Cosine
	}

	fn vector_dim(&self) -> usize {
		self.vector_dim
	}

	fn search<'a>(&'a self, query: &'a SearchQuery) -> BoxFuture<'a, Result<Vec<Candidate>>> {
		Box::pin(async move { self.run_search(query) })
	}

	fn neighbors<'a>(
		&'a self,
		source: &'a str,
		first: i64,
		last: i64,
	) -> BoxFuture<'a, Result<Vec<Chunk>>> {
		Box::pin(async move { self.run_neighbors(source, first, last) })
	}

	fn upsert<'a>(&'a self, points: Vec<IndexPoint>) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.check_reachable()?;

			let mut state = self.lock();

			if !state.exists {
				return Err(Error::NotFound(format!("Collection {}.", self.collection)));
			}

			for point in points {
				state.points.insert(point.id.to_string(), point);
			}

			Ok(())
		})
	}

	fn delete<'a>(&'a self, ids: Vec<PointKey>) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.check_reachable()?;

			let mut state = self.lock();

			for id in ids {
				state.points.remove(&id.to_string());
			}

			Ok(())
		})
	}

	fn ensure_collection(&self) -> BoxFuture<'_, Result<bool>> {
		Box::pin(async move {
			self.check_reachable()?;

			let mut state = self.lock();
			let created = !state.exists;

			state.exists = true;

			Ok(created)
		})
	}

	fn collection_info(&self) -> BoxFuture<'_, Result<CollectionInfo>> {
		Box::pin(async move {
			self.check_reachable()?;

			let state = self.lock();

			if !state.exists {
				return Ok(CollectionInfo {
					collection: self.collection.clone(),
					exists: false,
					status: "missing".to_string(),
					points_count: None,
					indexed_vectors_count: None,
					segments_count: 0,
				});
			}

			let count = state.points.len() as u64;

			Ok(CollectionInfo {
				collection: self.collection.clone(),
				exists: true,
				status: "green".to_string(),
				points_count: Some(count),
				indexed_vectors_count: Some(count),
				segments_count: 1,
			})
		})
	}
}

pub fn chunk(source: &str, position: i64, text: &str) -> Chunk {
	let title = source.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(source);

	Chunk {
		id: format!("{source}#{position}"),
		source: source.to_string(),
		title: title.to_string(),
		position,
		text: text.to_string(),
	}
}

pub fn chunk_payload(chunk: &Chunk) -> Map<String, Value> {
	let mut payload = Map::new();

	payload.insert(TEXT_KEY.to_string(), Value::String(chunk.text.clone()));
	payload.insert(SOURCE_KEY.to_string(), Value::String(chunk.source.clone()));
	payload.insert(TITLE_KEY.to_string(), Value::String(chunk.title.clone()));
	payload.insert(POSITION_KEY.to_string(), Value::from(chunk.position));

	payload
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
	if a.len() != b.len() {
		return 0.0;
	}

	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

	if norm_a == 0.0 || norm_b == 0.0 {
		return 0.0;
	}

	dot / (norm_a * norm_b)
}
