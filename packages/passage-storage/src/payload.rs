//! Payload contract shared by every index backend.
//!
//! A point must carry its chunk text (`text`, or `chunk_text` from older ingests), the owning
//! `source`, a `title`, and the sequential `chunk_index` inside that source.

use std::collections::HashMap;

use qdrant_client::qdrant::{PointId, Value, point_id::PointIdOptions, value::Kind};
use serde_json::{Map, Value as JsonValue};

use crate::{Error, Result, models::Chunk};

pub const TEXT_KEY: &str = "text";
pub const LEGACY_TEXT_KEY: &str = "chunk_text";
pub const SOURCE_KEY: &str = "source";
pub const TITLE_KEY: &str = "title";
pub const POSITION_KEY: &str = "chunk_index";
pub const EXTERNAL_ID_KEY: &str = "external_id";

pub fn point_id_string(point_id: &PointId) -> Option<String> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Num(id)) => Some(id.to_string()),
		Some(PointIdOptions::Uuid(id)) => Some(id.to_string()),
		None => None,
	}
}

pub fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

pub fn payload_i64(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::IntegerValue(value)) => Some(*value),
		Some(Kind::DoubleValue(value)) =>
			if value.fract() == 0.0 {
				Some(*value as i64)
			} else {
				None
			},
		_ => None,
	}
}

/// Builds a chunk from a stored point, or `None` when the payload breaks the contract.
pub fn chunk_from_payload(id: String, payload: &HashMap<String, Value>) -> Option<Chunk> {
	let text = payload_string(payload, TEXT_KEY).or_else(|| payload_string(payload, LEGACY_TEXT_KEY))?;
	let source = payload_string(payload, SOURCE_KEY)?;
	let position = payload_i64(payload, POSITION_KEY)?;
	let title = payload_string(payload, TITLE_KEY).unwrap_or_else(|| source.clone());

	Some(Chunk { id, source, title, position, text })
}

/// Same as [`chunk_from_payload`] for payloads still in JSON form.
pub fn chunk_from_json(id: String, payload: &Map<String, JsonValue>) -> Option<Chunk> {
	let text = json_string(payload, TEXT_KEY).or_else(|| json_string(payload, LEGACY_TEXT_KEY))?;
	let source = json_string(payload, SOURCE_KEY)?;
	let position = json_i64(payload, POSITION_KEY)?;
	let title = json_string(payload, TITLE_KEY).unwrap_or_else(|| source.clone());

	Some(Chunk { id, source, title, position, text })
}

/// Rejects payloads the retrieval pipeline cannot use.
pub fn validate_payload(payload: &Map<String, JsonValue>) -> Result<()> {
	if json_string(payload, TEXT_KEY).or_else(|| json_string(payload, LEGACY_TEXT_KEY)).is_none() {
		return Err(Error::InvalidArgument(format!(
			"Payload must include a string {TEXT_KEY} or {LEGACY_TEXT_KEY}."
		)));
	}

	for key in [SOURCE_KEY, TITLE_KEY] {
		if json_string(payload, key).map(|value| value.trim().is_empty()).unwrap_or(true) {
			return Err(Error::InvalidArgument(format!("Payload must include a non-empty {key}.")));
		}
	}

	if json_i64(payload, POSITION_KEY).map(|position| position < 0).unwrap_or(true) {
		return Err(Error::InvalidArgument(format!(
			"Payload must include a non-negative integer {POSITION_KEY}."
		)));
	}

	Ok(())
}

/// Converts a JSON payload into the index's value map.
pub fn to_index_payload(payload: Map<String, JsonValue>) -> HashMap<String, Value> {
	payload.into_iter().map(|(key, value)| (key, Value::from(value))).collect()
}

fn json_string(payload: &Map<String, JsonValue>, key: &str) -> Option<String> {
	payload.get(key).and_then(JsonValue::as_str).map(str::to_string)
}

fn json_i64(payload: &Map<String, JsonValue>, key: &str) -> Option<i64> {
	let value = payload.get(key)?;

	value.as_i64().or_else(|| value.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn json_payload(value: JsonValue) -> Map<String, JsonValue> {
		value.as_object().cloned().expect("payload must be an object")
	}

	#[test]
	fn legacy_text_key_is_accepted() {
		let payload = json_payload(serde_json::json!({
			"chunk_text": "body",
			"source": "a.tex",
			"title": "A",
			"chunk_index": 2
		}));
		let chunk = chunk_from_json("1".to_string(), &payload).expect("chunk expected");

		assert_eq!(chunk.text, "body");
		assert_eq!(chunk.position, 2);
		assert!(validate_payload(&payload).is_ok());
	}

	#[test]
	fn missing_position_is_rejected() {
		let payload =
			json_payload(serde_json::json!({ "text": "body", "source": "a.tex", "title": "A" }));

		assert!(chunk_from_json("1".to_string(), &payload).is_none());
		assert!(matches!(validate_payload(&payload), Err(Error::InvalidArgument(_))));
	}

	#[test]
	fn qdrant_payload_round_trips_contract_fields() {
		let payload = to_index_payload(json_payload(serde_json::json!({
			"text": "body",
			"source": "a.tex",
			"chunk_index": 4
		})));
		let chunk = chunk_from_payload("9".to_string(), &payload).expect("chunk expected");

		assert_eq!(chunk.title, "a.tex");
		assert_eq!(chunk.position, 4);
	}
}
