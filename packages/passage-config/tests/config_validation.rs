use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use passage_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with(section: &[&str], key: &str, value: Value) -> String {
	set_value(SAMPLE_CONFIG_TEMPLATE_TOML, section, key, value)
}

fn set_value(base: &str, section: &[&str], key: &str, value: Value) -> String {
	let mut root: Value = toml::from_str(base).expect("Failed to parse template config.");
	let mut table = root.as_table_mut().expect("Template config must be a table.");

	for name in section {
		table = table
			.entry(name.to_string())
			.or_insert(Value::Table(toml::Table::new()))
			.as_table_mut()
			.expect("Config section must be a table.");
	}

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be after the UNIX epoch.")
		.as_nanos();
	let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
	let path = env::temp_dir().join(format!("passage_config_test_{nanos}_{seq}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_sample(payload: String) -> Result<Config, Error> {
	let path = write_temp_config(payload);
	let result = passage_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn validation_message(payload: String) -> String {
	match load_sample(payload) {
		Err(Error::Validation { message }) => message,
		other => panic!("Expected a validation error, got {other:?}."),
	}
}

#[test]
fn sample_config_loads_with_defaults() {
	let cfg = load_sample(SAMPLE_CONFIG_TEMPLATE_TOML.to_string())
		.expect("Sample config must load.");

	assert_eq!(cfg.storage.qdrant.distance, "cosine");
	assert_eq!(cfg.providers.embedding.api_key, None);
	assert_eq!(cfg.tokenizer.language, "auto");
	assert_eq!(cfg.injection.floor, 3);
	assert_eq!(cfg.rag.candidates.multiplier, 24);
	assert_eq!(cfg.rag.stitch.after, 8);
	assert!((cfg.diversity.mmr_lambda - 0.7).abs() < f32::EPSILON);
}

#[test]
fn parse_accepts_inline_config() {
	let cfg = passage_config::parse(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Inline config must parse.");

	assert_eq!(cfg.storage.qdrant.collection, "latex_books");
}

#[test]
fn distance_aliases_are_normalized() {
	let payload = sample_toml_with(&["storage", "qdrant"], "distance", Value::String("L2".into()));
	let cfg = load_sample(payload).expect("Alias must be accepted.");

	assert_eq!(cfg.storage.qdrant.distance, "euclid");
}

#[test]
fn unknown_distance_is_rejected() {
	let payload =
		sample_toml_with(&["storage", "qdrant"], "distance", Value::String("hamming".into()));

	assert_eq!(
		validation_message(payload),
		"storage.qdrant.distance must be one of cosine, dot, euclid, or manhattan."
	);
}

#[test]
fn negative_weight_is_rejected() {
	let payload = sample_toml_with(&["ranking", "weights"], "lexical", Value::Float(-0.1));

	assert_eq!(validation_message(payload), "ranking.weights.lexical must be zero or greater.");
}

#[test]
fn zero_weight_sum_is_rejected() {
	let weights = ["ranking", "weights"];
	let payload = sample_toml_with(&weights, "vector", Value::Float(0.0));
	let payload = set_value(&payload, &weights, "lexical", Value::Float(0.0));
	let payload = set_value(&payload, &weights, "fuzzy", Value::Float(0.0));

	assert_eq!(
		validation_message(payload),
		"ranking.weights must sum to a value greater than zero and at most 10.0."
	);
}

#[test]
fn mmr_lambda_out_of_range_is_rejected() {
	let payload = sample_toml_with(&["diversity"], "mmr_lambda", Value::Float(1.5));

	assert_eq!(validation_message(payload), "diversity.mmr_lambda must be in the range 0.0-1.0.");
}

#[test]
fn fuzzy_distance_above_bound_is_rejected() {
	let payload = sample_toml_with(&["ranking", "fuzzy"], "max_distance", Value::Integer(4));

	assert_eq!(validation_message(payload), "ranking.fuzzy.max_distance must be 3 or less.");
}

#[test]
fn embedding_dimensions_must_match_vector_dim() {
	let payload = sample_toml_with(&["providers", "embedding"], "dimensions", Value::Integer(8));

	assert_eq!(
		validation_message(payload),
		"providers.embedding.dimensions must match storage.qdrant.vector_dim."
	);
}

#[test]
fn injection_bonus_is_bounded() {
	let payload = sample_toml_with(&["injection"], "bonus", Value::Float(2.0));

	assert_eq!(validation_message(payload), "injection.bonus must be in the range 0.0-1.0.");
}

#[test]
fn injection_templates_need_placeholder() {
	let payload = sample_toml_with(
		&["injection"],
		"source_templates",
		Value::Array(vec![Value::String("static.tex".into())]),
	);

	assert_eq!(
		validation_message(payload),
		"injection.source_templates entries must contain {title}."
	);
}

#[test]
fn candidate_bounds_must_be_ordered() {
	let payload = sample_toml_with(&["search", "candidates"], "min", Value::Integer(500));

	assert_eq!(
		validation_message(payload),
		"search.candidates.min must be greater than zero and at most search.candidates.max."
	);
}

#[test]
fn rag_budget_cannot_exceed_maximum() {
	let payload = sample_toml_with(&["rag"], "context_chars", Value::Integer(20_000));

	assert_eq!(validation_message(payload), "rag.context_chars must be rag.max_context_chars or less.");
}

#[test]
fn missing_file_reports_read_error() {
	let path = env::temp_dir().join("passage_config_missing_file.toml");
	let result = passage_config::load(&path);

	assert!(matches!(result, Err(Error::ReadConfig { .. })));
}
