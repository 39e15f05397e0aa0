use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One retrievable span of a source document.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Chunk {
	pub id: String,
	pub source: String,
	pub title: String,
	pub position: i64,
	pub text: String,
}

/// A chunk with the raw score the index assigned to it.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
	pub chunk: Chunk,
	pub similarity: f32,
}

/// Point identifier as accepted from callers: an unsigned integer or a string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PointKey {
	Num(u64),
	Text(String),
}
impl std::fmt::Display for PointKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Num(id) => write!(f, "{id}"),
			Self::Text(id) => f.write_str(id),
		}
	}
}

/// A point ready for the index. `id` is already an integer or a canonical UUID.
#[derive(Clone, Debug)]
pub struct IndexPoint {
	pub id: PointKey,
	pub vector: Vec<f32>,
	pub payload: Map<String, Value>,
}

#[derive(Clone, Debug)]
pub struct SearchQuery {
	pub vector: Vec<f32>,
	pub limit: u64,
	pub score_threshold: Option<f32>,
	/// Restricts matches to one source document.
	pub source: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CollectionInfo {
	pub collection: String,
	pub exists: bool,
	pub status: String,
	pub points_count: Option<u64>,
	pub indexed_vectors_count: Option<u64>,
	pub segments_count: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
	Cosine,
	Dot,
	Euclid,
	Manhattan,
}
impl Distance {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"cosine" => Some(Self::Cosine),
			"dot" => Some(Self::Dot),
			"euclid" => Some(Self::Euclid),
			"manhattan" => Some(Self::Manhattan),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Cosine => "cosine",
			Self::Dot => "dot",
			Self::Euclid => "euclid",
			Self::Manhattan => "manhattan",
		}
	}
}
