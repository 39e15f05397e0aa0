use std::time::Duration;

use qdrant_client::{
	Qdrant,
	client::Payload,
	qdrant::{
		CollectionStatus, Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
		DeletePointsBuilder, Distance as QdrantDistance, FieldType, Filter, PointId, PointStruct,
		PointsIdsList, Query, QueryPointsBuilder, Range, ScrollPointsBuilder,
		UpsertPointsBuilder, VectorParamsBuilder,
	},
};

use crate::{
	BoxFuture, ChunkIndex, Error, Result,
	models::{Candidate, Chunk, CollectionInfo, Distance, IndexPoint, PointKey, SearchQuery},
	payload::{self, POSITION_KEY, SOURCE_KEY},
};

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
	pub distance: Distance,
}
impl QdrantStore {
	pub fn new(cfg: &passage_config::Qdrant) -> Result<Self> {
		let distance = Distance::parse(&cfg.distance).ok_or_else(|| {
			Error::InvalidArgument(format!("Unsupported distance {}.", cfg.distance))
		})?;
		let client = Qdrant::from_url(&cfg.url)
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.api_key(cfg.api_key.clone())
			.build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim, distance })
	}

	async fn search_points(&self, query: &SearchQuery) -> Result<Vec<Candidate>> {
		let mut request = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(query.vector.clone()))
			.limit(query.limit)
			.with_payload(true);

		if let Some(source) = query.source.as_ref() {
			request = request.filter(Filter::must([Condition::matches(SOURCE_KEY, source.clone())]));
		}
		if let Some(threshold) = query.score_threshold {
			request = request.score_threshold(threshold);
		}

		let response = self.client.query(request).await?;
		let mut out = Vec::with_capacity(response.result.len());

		for point in response.result {
			let Some(id) = point.id.as_ref().and_then(payload::point_id_string) else {
				tracing::warn!(collection = %self.collection, "Skipping point without id.");

				continue;
			};
			let Some(chunk) = payload::chunk_from_payload(id.clone(), &point.payload) else {
				tracing::warn!(point_id = %id, "Skipping point with incomplete chunk payload.");

				continue;
			};

			out.push(Candidate { chunk, similarity: point.score });
		}

		Ok(out)
	}

	async fn scroll_range(&self, source: &str, first: i64, last: i64) -> Result<Vec<Chunk>> {
		if last < first {
			return Ok(Vec::new());
		}

		let filter = Filter::must([
			Condition::matches(SOURCE_KEY, source.to_string()),
			Condition::range(
				POSITION_KEY,
				Range { gte: Some(first as f64), lte: Some(last as f64), ..Default::default() },
			),
		]);
		let limit = u32::try_from(last - first + 1).unwrap_or(u32::MAX);
		let request = ScrollPointsBuilder::new(self.collection.clone())
			.filter(filter)
			.limit(limit)
			.with_payload(true);
		let response = self.client.scroll(request).await?;
		let mut chunks: Vec<Chunk> = response
			.result
			.into_iter()
			.filter_map(|point| {
				let id = point.id.as_ref().and_then(payload::point_id_string)?;

				payload::chunk_from_payload(id, &point.payload)
			})
			.collect();

		chunks.sort_by_key(|chunk| chunk.position);

		Ok(chunks)
	}

	async fn upsert_points(&self, points: Vec<IndexPoint>) -> Result<()> {
		if points.is_empty() {
			return Ok(());
		}

		let mut structs = Vec::with_capacity(points.len());

		for point in points {
			let payload = Payload::from(payload::to_index_payload(point.payload));

			structs.push(PointStruct::new(point_id(&point.id), point.vector, payload));
		}

		let upsert = UpsertPointsBuilder::new(self.collection.clone(), structs).wait(true);

		self.client.upsert_points(upsert).await?;

		Ok(())
	}

	async fn delete_points(&self, ids: Vec<PointKey>) -> Result<()> {
		if ids.is_empty() {
			return Ok(());
		}

		let ids = ids.iter().map(point_id).collect();
		let delete = DeletePointsBuilder::new(self.collection.clone())
			.points(PointsIdsList { ids })
			.wait(true);

		self.client.delete_points(delete).await?;

		Ok(())
	}

	async fn create_if_missing(&self) -> Result<bool> {
		if self.client.collection_exists(&self.collection).await? {
			return Ok(false);
		}

		let builder = CreateCollectionBuilder::new(self.collection.clone()).vectors_config(
			VectorParamsBuilder::new(self.vector_dim.into(), qdrant_distance(self.distance)),
		);

		if let Err(err) = self.client.create_collection(builder).await {
			// Another caller may have created it in the meantime.
			if self.client.collection_exists(&self.collection).await? {
				return Ok(false);
			}

			return Err(err.into());
		}

		for (field, field_type) in [(SOURCE_KEY, FieldType::Keyword), (POSITION_KEY, FieldType::Integer)]
		{
			let index =
				CreateFieldIndexCollectionBuilder::new(self.collection.clone(), field, field_type)
					.wait(true);

			self.client.create_field_index(index).await?;
		}

		tracing::info!(
			collection = %self.collection,
			vector_dim = self.vector_dim,
			distance = self.distance.as_str(),
			"Created collection."
		);

		Ok(true)
	}

	async fn fetch_info(&self) -> Result<CollectionInfo> {
		if !self.client.collection_exists(&self.collection).await? {
			return Ok(CollectionInfo {
				collection: self.collection.clone(),
				exists: false,
				status: "missing".to_string(),
				points_count: None,
				indexed_vectors_count: None,
				segments_count: 0,
			});
		}

		let info = self
			.client
			.collection_info(&self.collection)
			.await?
			.result
			.ok_or_else(|| Error::NotFound(format!("Collection {} info.", self.collection)))?;
		let status = CollectionStatus::try_from(info.status)
			.map(|status| status.as_str_name().to_lowercase())
			.unwrap_or_else(|_| "unknown".to_string());

		Ok(CollectionInfo {
			collection: self.collection.clone(),
			exists: true,
			status,
			points_count: info.points_count,
			indexed_vectors_count: info.indexed_vectors_count,
			segments_count: info.segments_count,
		})
	}
}
impl ChunkIndex for QdrantStore {
	fn collection(&self) -> &str {
		&self.collection
	}

	fn distance(&self) -> Distance {
		self.distance
	}

	fn vector_dim(&self) -> usize {
		self.vector_dim as usize
	}

	fn search<'a>(&'a self, query: &'a SearchQuery) -> BoxFuture<'a, Result<Vec<Candidate>>> {
		Box::pin(self.search_points(query))
	}

	fn neighbors<'a>(
		&'a self,
		source: &'a str,
		first: i64,
		last: i64,
	) -> BoxFuture<'a, Result<Vec<Chunk>>> {
		Box::pin(self.scroll_range(source, first, last))
	}

	fn upsert<'a>(&'a self, points: Vec<IndexPoint>) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.upsert_points(points))
	}

	fn delete<'a>(&'a self, ids: Vec<PointKey>) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.delete_points(ids))
	}

	fn ensure_collection(&self) -> BoxFuture<'_, Result<bool>> {
		Box::pin(self.create_if_missing())
	}

	fn collection_info(&self) -> BoxFuture<'_, Result<CollectionInfo>> {
		Box::pin(self.fetch_info())
	}
}

fn point_id(key: &PointKey) -> PointId {
	match key {
		PointKey::Num(id) => PointId::from(*id),
		PointKey::Text(id) => PointId::from(id.clone()),
	}
}

fn qdrant_distance(distance: Distance) -> QdrantDistance {
	match distance {
		Distance::Cosine => QdrantDistance::Cosine,
		Distance::Dot => QdrantDistance::Dot,
		Distance::Euclid => QdrantDistance::Euclid,
		Distance::Manhattan => QdrantDistance::Manhattan,
	}
}
