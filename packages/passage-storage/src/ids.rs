use uuid::Uuid;

use crate::{Error, Result, models::PointKey};

const DERIVED_ID_PREFIX: &str = "qdrant-ingest::";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedId {
	pub key: PointKey,
	/// The caller's identifier when it had to be replaced by a derived UUID.
	pub external_id: Option<String>,
}

/// Maps a caller id onto what the index accepts: integers stay, UUIDs are canonicalized, and any
/// other string becomes a stable UUIDv5.
pub fn normalize_point_id(key: &PointKey) -> Result<NormalizedId> {
	match key {
		PointKey::Num(id) => Ok(NormalizedId { key: PointKey::Num(*id), external_id: None }),
		PointKey::Text(raw) => {
			let trimmed = raw.trim();

			if trimmed.is_empty() {
				return Err(Error::InvalidArgument("Point id must be non-empty.".to_string()));
			}
			if let Ok(uuid) = Uuid::parse_str(trimmed) {
				return Ok(NormalizedId {
					key: PointKey::Text(uuid.hyphenated().to_string()),
					external_id: None,
				});
			}

			let derived =
				Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("{DERIVED_ID_PREFIX}{trimmed}").as_bytes());

			Ok(NormalizedId {
				key: PointKey::Text(derived.to_string()),
				external_id: Some(trimmed.to_string()),
			})
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn integers_pass_through() {
		let normalized = normalize_point_id(&PointKey::Num(7)).expect("normalize failed");

		assert_eq!(normalized, NormalizedId { key: PointKey::Num(7), external_id: None });
	}

	#[test]
	fn uuids_are_canonicalized() {
		let normalized =
			normalize_point_id(&PointKey::Text("67E55044-10B1-426F-9247-BB680E5FE0C8".to_string()))
				.expect("normalize failed");

		assert_eq!(normalized.key, PointKey::Text("67e55044-10b1-426f-9247-bb680e5fe0c8".to_string()));
		assert_eq!(normalized.external_id, None);
	}

	#[test]
	fn other_strings_derive_stable_uuids() {
		let first = normalize_point_id(&PointKey::Text("book-1#3".to_string())).expect("normalize failed");
		let second = normalize_point_id(&PointKey::Text("book-1#3".to_string())).expect("normalize failed");

		assert_eq!(first, second);
		assert_eq!(first.external_id.as_deref(), Some("book-1#3"));

		let PointKey::Text(id) = first.key else { panic!("Expected a UUID key.") };

		assert_eq!(Uuid::parse_str(&id).map(|uuid| uuid.get_version_num()).ok(), Some(5));
	}

	#[test]
	fn empty_strings_are_rejected() {
		assert!(normalize_point_id(&PointKey::Text("  ".to_string())).is_err());
	}
}
