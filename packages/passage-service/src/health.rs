use time::OffsetDateTime;

use crate::{PassageService, index_call};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
	Ok,
	/// Reachable but not ready to answer queries.
	Degraded,
	/// The vector index cannot be reached.
	Error,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthReport {
	pub status: HealthStatus,
	pub detail: Option<String>,
	pub collection: String,
	pub points_count: Option<u64>,
	pub vector_size: usize,
	pub distance: String,
	pub model: String,
	pub embedding_ready: bool,
	#[serde(with = "crate::time_serde")]
	pub checked_at: OffsetDateTime,
}

impl PassageService {
	/// Probes the index and the embedding backend. Problems are reported in the status, never
	/// as an error.
	pub async fn health(&self) -> HealthReport {
		let mut report = HealthReport {
			status: HealthStatus::Ok,
			detail: None,
			collection: self.index.collection().to_string(),
			points_count: None,
			vector_size: self.index.vector_dim(),
			distance: self.index.distance().as_str().to_string(),
			model: self.embedding.model().to_string(),
			embedding_ready: false,
			checked_at: OffsetDateTime::now_utc(),
		};
		let info = match index_call(self.index_timeout(), self.index.collection_info()).await {
			Ok(info) => info,
			Err(err) => {
				tracing::warn!(error = %err, "Health check could not reach the index.");

				report.status = HealthStatus::Error;
				report.detail = Some(err.to_string());

				return report;
			},
		};

		report.points_count = info.points_count;

		if !info.exists {
			report.status = HealthStatus::Degraded;
			report.detail = Some(format!("Collection {} does not exist.", info.collection));
		}

		match self.embedding.ensure_ready().await {
			Ok(_) => report.embedding_ready = true,
			Err(err) => {
				tracing::warn!(error = %err, "Health check could not initialize the embedding backend.");

				report.status = HealthStatus::Degraded;

				let detail = err.to_string();

				report.detail = Some(match report.detail.take() {
					Some(existing) => format!("{existing} {detail}"),
					None => detail,
				});
			},
		}

		report
	}
}
