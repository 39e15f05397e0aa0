use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use crate::state::AppState;
use passage_service::{
	DeleteRequest, DeleteResponse, EmbedRequest, EmbedResponse, EnsureCollectionResponse, Error,
	HealthReport, HealthStatus, RagRequest, RagResponse, SearchRequest, SearchResponse,
	UpsertRequest, UpsertResponse,
};
use passage_storage::models::CollectionInfo;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/search", post(search))
		.route("/v1/rag", post(rag))
		.route("/v1/upsert", post(upsert))
		.route("/v1/delete", post(delete))
		.route("/v1/ensure-collection", post(ensure_collection))
		.route("/v1/collection-info", get(collection_info))
		.route("/v1/embed", post(embed))
		.with_state(state)
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
	let report = state.service.health().await;
	let status = match report.status {
		HealthStatus::Ok | HealthStatus::Degraded => StatusCode::OK,
		HealthStatus::Error => StatusCode::SERVICE_UNAVAILABLE,
	};

	(status, Json(report))
}

async fn search(
	State(state): State<AppState>,
	Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let response = state.service.search(payload).await?;

	Ok(Json(response))
}

async fn rag(
	State(state): State<AppState>,
	Json(payload): Json<RagRequest>,
) -> Result<Json<RagResponse>, ApiError> {
	let response = state.service.rag(payload).await?;

	Ok(Json(response))
}

async fn upsert(
	State(state): State<AppState>,
	Json(payload): Json<UpsertRequest>,
) -> Result<Json<UpsertResponse>, ApiError> {
	let response = state.service.upsert(payload).await?;

	Ok(Json(response))
}

async fn delete(
	State(state): State<AppState>,
	Json(payload): Json<DeleteRequest>,
) -> Result<Json<DeleteResponse>, ApiError> {
	let response = state.service.delete(payload).await?;

	Ok(Json(response))
}

async fn ensure_collection(
	State(state): State<AppState>,
) -> Result<Json<EnsureCollectionResponse>, ApiError> {
	let response = state.service.ensure_collection().await?;

	Ok(Json(response))
}

async fn collection_info(State(state): State<AppState>) -> Result<Json<CollectionInfo>, ApiError> {
	let response = state.service.collection_info().await?;

	Ok(Json(response))
}

async fn embed(
	State(state): State<AppState>,
	Json(payload): Json<EmbedRequest>,
) -> Result<Json<EmbedResponse>, ApiError> {
	let response = state.service.embed(payload).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: &'static str,
	message: String,
	retryable: bool,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
	retryable: bool,
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let retryable = err.is_retryable();
		let (status, error_code) = match &err {
			Error::EmptyQuery => (StatusCode::BAD_REQUEST, "EMPTY_QUERY"),
			Error::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
			Error::IndexUnavailable { .. } =>
				(StatusCode::SERVICE_UNAVAILABLE, "INDEX_UNAVAILABLE"),
			Error::EmbeddingUnavailable { .. } =>
				(StatusCode::SERVICE_UNAVAILABLE, "EMBEDDING_UNAVAILABLE"),
		};

		if retryable {
			tracing::warn!(error = %err, "Request failed on an upstream dependency.");
		}

		Self { status, error_code, message: err.to_string(), retryable }
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, retryable: self.retryable };

		(self.status, Json(body)).into_response()
	}
}
