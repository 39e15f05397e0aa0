use serde_json::{Map, Value};

use passage_config::Qdrant;
use passage_storage::{
	ChunkIndex,
	models::{IndexPoint, PointKey, SearchQuery},
	qdrant::QdrantStore,
};
use passage_testkit::TestCollection;

fn payload(source: &str, position: i64, text: &str) -> Map<String, Value> {
	let mut payload = Map::new();

	payload.insert("text".to_string(), Value::String(text.to_string()));
	payload.insert("source".to_string(), Value::String(source.to_string()));
	payload.insert("title".to_string(), Value::String(source.to_string()));
	payload.insert("chunk_index".to_string(), Value::from(position));

	payload
}

#[tokio::test]
#[ignore = "Requires external Qdrant. Set PASSAGE_QDRANT_URL to run."]
async fn points_round_trip_through_qdrant() {
	let Some(url) = passage_testkit::env_qdrant_url() else {
		eprintln!("Skipping points_round_trip_through_qdrant; set PASSAGE_QDRANT_URL to run this test.");

		return;
	};
	let collection = TestCollection::new(&url, "passage_live");
	let cfg = Qdrant {
		url: url.clone(),
		collection: collection.name().to_string(),
		vector_dim: 3,
		distance: "cosine".to_string(),
		timeout_ms: 10_000,
		api_key: None,
	};
	let store = QdrantStore::new(&cfg).expect("Failed to build Qdrant store.");

	assert!(store.ensure_collection().await.expect("Failed to create collection."));
	assert!(!store.ensure_collection().await.expect("Failed to re-check collection."));

	let points = (0..4)
		.map(|position: i64| IndexPoint {
			id: PointKey::Num(position as u64 + 1),
			vector: vec![1.0, position as f32, 0.0],
			payload: payload("graphs.tex", position, &format!("Фрагмент {position}.")),
		})
		.chain(std::iter::once(IndexPoint {
			id: PointKey::Num(100),
			vector: vec![0.0, 0.0, 1.0],
			payload: payload("trees.tex", 0, "Дерево."),
		}))
		.collect();

	store.upsert(points).await.expect("Failed to upsert points.");

	let query = SearchQuery {
		vector: vec![1.0, 0.0, 0.0],
		limit: 10,
		score_threshold: None,
		source: Some("graphs.tex".to_string()),
	};
	let found = store.search(&query).await.expect("Failed to search.");

	assert_eq!(found.len(), 4);
	assert!(found.iter().all(|candidate| candidate.chunk.source == "graphs.tex"));

	let neighbors = store.neighbors("graphs.tex", 1, 2).await.expect("Failed to fetch neighbors.");
	let positions: Vec<i64> = neighbors.iter().map(|chunk| chunk.position).collect();

	assert_eq!(positions, vec![1, 2]);

	store.delete(vec![PointKey::Num(100)]).await.expect("Failed to delete point.");

	let info = store.collection_info().await.expect("Failed to read collection info.");

	assert!(info.exists);
	assert_eq!(info.points_count, Some(4));

	collection.cleanup().await.expect("Failed to clean up test collection.");
}
