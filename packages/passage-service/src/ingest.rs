use serde_json::{Map, Value};

use crate::{Error, PassageService, Result, index_call};
use passage_storage::{
	ids,
	models::{CollectionInfo, IndexPoint, PointKey},
	payload::{self, EXTERNAL_ID_KEY},
};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UpsertPoint {
	pub id: PointKey,
	pub vector: Vec<f32>,
	pub payload: Map<String, Value>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UpsertRequest {
	pub points: Vec<UpsertPoint>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UpsertResponse {
	pub collection: String,
	/// Stored ids in request order, after normalization.
	pub ids: Vec<PointKey>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DeleteRequest {
	pub ids: Vec<PointKey>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DeleteResponse {
	pub collection: String,
	pub deleted: usize,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EnsureCollectionResponse {
	pub collection: String,
	pub created: bool,
	pub vector_size: usize,
	pub distance: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EmbedRequest {
	pub texts: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EmbedResponse {
	pub model: String,
	pub dimensions: usize,
	pub vectors: Vec<Vec<f32>>,
}

impl PassageService {
	pub async fn upsert(&self, req: UpsertRequest) -> Result<UpsertResponse> {
		if req.points.is_empty() {
			return Err(Error::InvalidRequest { message: "points must be non-empty.".to_string() });
		}

		let expected = self.index.vector_dim();
		let mut points = Vec::with_capacity(req.points.len());

		for (i, point) in req.points.into_iter().enumerate() {
			if point.vector.len() != expected {
				return Err(Error::InvalidRequest {
					message: format!(
						"points[{i}].vector has {} dimensions, expected {expected}.",
						point.vector.len()
					),
				});
			}
			if point.vector.iter().any(|value| !value.is_finite()) {
				return Err(Error::InvalidRequest {
					message: format!("points[{i}].vector must contain finite values."),
				});
			}

			payload::validate_payload(&point.payload).map_err(|err| Error::InvalidRequest {
				message: format!("points[{i}].payload: {err}"),
			})?;

			let normalized = ids::normalize_point_id(&point.id)?;
			let mut body = point.payload;

			if let Some(external_id) = normalized.external_id {
				body.insert(EXTERNAL_ID_KEY.to_string(), Value::String(external_id));
			}

			points.push(IndexPoint { id: normalized.key, vector: point.vector, payload: body });
		}

		let timeout = self.index_timeout();

		index_call(timeout, self.index.ensure_collection()).await?;

		let stored: Vec<PointKey> = points.iter().map(|point| point.id.clone()).collect();

		index_call(timeout, self.index.upsert(points)).await?;

		tracing::info!(collection = self.index.collection(), points = stored.len(), "Points upserted.");

		Ok(UpsertResponse { collection: self.index.collection().to_string(), ids: stored })
	}

	pub async fn delete(&self, req: DeleteRequest) -> Result<DeleteResponse> {
		if req.ids.is_empty() {
			return Err(Error::InvalidRequest { message: "ids must be non-empty.".to_string() });
		}

		let keys = req
			.ids
			.iter()
			.map(|id| ids::normalize_point_id(id).map(|normalized| normalized.key))
			.collect::<passage_storage::Result<Vec<_>>>()?;
		let deleted = keys.len();

		index_call(self.index_timeout(), self.index.delete(keys)).await?;

		tracing::info!(collection = self.index.collection(), points = deleted, "Points deleted.");

		Ok(DeleteResponse { collection: self.index.collection().to_string(), deleted })
	}

	pub async fn ensure_collection(&self) -> Result<EnsureCollectionResponse> {
		let created = index_call(self.index_timeout(), self.index.ensure_collection()).await?;

		Ok(EnsureCollectionResponse {
			collection: self.index.collection().to_string(),
			created,
			vector_size: self.index.vector_dim(),
			distance: self.index.distance().as_str().to_string(),
		})
	}

	pub async fn collection_info(&self) -> Result<CollectionInfo> {
		index_call(self.index_timeout(), self.index.collection_info()).await
	}

	pub async fn embed(&self, req: EmbedRequest) -> Result<EmbedResponse> {
		if req.texts.is_empty() {
			return Err(Error::InvalidRequest { message: "texts must be non-empty.".to_string() });
		}
		if let Some(i) = req.texts.iter().position(|text| text.trim().is_empty()) {
			return Err(Error::InvalidRequest {
				message: format!("texts[{i}] must contain non-whitespace text."),
			});
		}

		let vectors = self.embedding.embed(&req.texts).await?;
		let info = self.embedding.ensure_ready().await?;

		Ok(EmbedResponse { model: info.model.clone(), dimensions: info.dimensions, vectors })
	}
}
