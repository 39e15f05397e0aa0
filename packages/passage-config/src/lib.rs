mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Candidates, Config, Diversity, EmbeddingProviderConfig, Expansion, Injection, Phrases,
	Providers, Qdrant, Rag, Ranking, RankingFuzzy, RankingHeuristics, RankingWeights, Search,
	Service, Stitch, Storage, Tokenizer,
};

use std::{fs, path::Path};

pub const DISTANCES: [&str; 4] = ["cosine", "dot", "euclid", "manhattan"];
pub const LANGUAGES: [&str; 3] = ["auto", "ru", "en"];
pub const MAX_FUZZY_DISTANCE: u32 = 3;
pub const MAX_STITCH_WINDOW: u32 = 20;
pub const MAX_WEIGHT_SUM: f32 = 10.0;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

/// Parses, normalizes, and validates a config held in memory.
pub fn parse(raw: &str) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw).map_err(|err| Error::ParseInline { source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(invalid("service.http_bind must be non-empty."));
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(invalid("storage.qdrant.collection must be non-empty."));
	}
	if cfg.storage.qdrant.vector_dim == 0 {
		return Err(invalid("storage.qdrant.vector_dim must be greater than zero."));
	}
	if !DISTANCES.contains(&cfg.storage.qdrant.distance.as_str()) {
		return Err(invalid(
			"storage.qdrant.distance must be one of cosine, dot, euclid, or manhattan.",
		));
	}
	if cfg.storage.qdrant.timeout_ms == 0 {
		return Err(invalid("storage.qdrant.timeout_ms must be greater than zero."));
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(invalid("providers.embedding.dimensions must be greater than zero."));
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(invalid(
			"providers.embedding.dimensions must match storage.qdrant.vector_dim.",
		));
	}
	if cfg.providers.embedding.timeout_ms == 0 {
		return Err(invalid("providers.embedding.timeout_ms must be greater than zero."));
	}
	if !LANGUAGES.contains(&cfg.tokenizer.language.as_str()) {
		return Err(invalid("tokenizer.language must be one of auto, ru, or en."));
	}
	if cfg.tokenizer.min_token_chars == 0 {
		return Err(invalid("tokenizer.min_token_chars must be greater than zero."));
	}
	if cfg.phrases.max_ngram < 2 {
		return Err(invalid("phrases.max_ngram must be at least 2."));
	}

	validate_ranking(cfg)?;

	if !cfg.expansion.min_hit_fraction.is_finite()
		|| !(0.0..=1.0).contains(&cfg.expansion.min_hit_fraction)
	{
		return Err(invalid("expansion.min_hit_fraction must be in the range 0.0-1.0."));
	}
	if cfg.expansion.max_fetch == 0 {
		return Err(invalid("expansion.max_fetch must be greater than zero."));
	}
	if let Some(threshold) = cfg.expansion.relaxed_score_threshold
		&& !threshold.is_finite()
	{
		return Err(invalid("expansion.relaxed_score_threshold must be a finite number."));
	}
	if !cfg.injection.bonus.is_finite() || !(0.0..=1.0).contains(&cfg.injection.bonus) {
		return Err(invalid("injection.bonus must be in the range 0.0-1.0."));
	}
	if cfg.injection.enabled && cfg.injection.fetch_limit == 0 {
		return Err(invalid("injection.fetch_limit must be greater than zero when enabled."));
	}
	if cfg.injection.max_title_words == 0 {
		return Err(invalid("injection.max_title_words must be greater than zero."));
	}
	if cfg.injection.source_templates.iter().any(|template| !template.contains("{title}")) {
		return Err(invalid("injection.source_templates entries must contain {title}."));
	}
	if !cfg.diversity.mmr_lambda.is_finite() || !(0.0..=1.0).contains(&cfg.diversity.mmr_lambda) {
		return Err(invalid("diversity.mmr_lambda must be in the range 0.0-1.0."));
	}

	validate_pipeline(
		"search",
		cfg.search.default_limit,
		cfg.search.max_limit,
		&cfg.search.candidates,
		&cfg.search.stitch,
	)?;

	if let Some(threshold) = cfg.search.score_threshold
		&& !threshold.is_finite()
	{
		return Err(invalid("search.score_threshold must be a finite number."));
	}

	validate_pipeline(
		"rag",
		cfg.rag.default_limit,
		cfg.rag.max_limit,
		&cfg.rag.candidates,
		&cfg.rag.stitch,
	)?;

	if cfg.rag.context_chars == 0 {
		return Err(invalid("rag.context_chars must be greater than zero."));
	}
	if cfg.rag.context_chars > cfg.rag.max_context_chars {
		return Err(invalid("rag.context_chars must be rag.max_context_chars or less."));
	}

	Ok(())
}

fn validate_ranking(cfg: &Config) -> Result<()> {
	let weights = &cfg.ranking.weights;

	for (label, value) in [
		("ranking.weights.vector", weights.vector),
		("ranking.weights.lexical", weights.lexical),
		("ranking.weights.fuzzy", weights.fuzzy),
	] {
		check_weight(label, value)?;
	}

	let sum = weights.vector + weights.lexical + weights.fuzzy;

	if sum <= 0.0 || sum > MAX_WEIGHT_SUM {
		return Err(invalid(
			"ranking.weights must sum to a value greater than zero and at most 10.0.",
		));
	}
	if cfg.ranking.fuzzy.max_distance > MAX_FUZZY_DISTANCE {
		return Err(invalid("ranking.fuzzy.max_distance must be 3 or less."));
	}

	let heuristics = &cfg.ranking.heuristics;

	for (label, value) in [
		("ranking.heuristics.phrase_text", heuristics.phrase_text),
		("ranking.heuristics.phrase_title", heuristics.phrase_title),
		("ranking.heuristics.title", heuristics.title),
		("ranking.heuristics.continuity", heuristics.continuity),
		("ranking.heuristics.definition", heuristics.definition),
		("ranking.heuristics.early_chunk", heuristics.early_chunk),
		("ranking.heuristics.boilerplate_penalty", heuristics.boilerplate_penalty),
	] {
		check_weight(label, value)?;
	}

	Ok(())
}

fn validate_pipeline(
	label: &str,
	default_limit: u32,
	max_limit: u32,
	candidates: &Candidates,
	stitch: &Stitch,
) -> Result<()> {
	if default_limit == 0 {
		return Err(invalid(format!("{label}.default_limit must be greater than zero.")));
	}
	if default_limit > max_limit {
		return Err(invalid(format!("{label}.default_limit must be {label}.max_limit or less.")));
	}
	if candidates.multiplier == 0 {
		return Err(invalid(format!("{label}.candidates.multiplier must be greater than zero.")));
	}
	if candidates.min == 0 || candidates.min > candidates.max {
		return Err(invalid(format!(
			"{label}.candidates.min must be greater than zero and at most {label}.candidates.max."
		)));
	}
	if stitch.max_chars == 0 {
		return Err(invalid(format!("{label}.stitch.max_chars must be greater than zero.")));
	}
	if stitch.before > MAX_STITCH_WINDOW || stitch.after > MAX_STITCH_WINDOW {
		return Err(invalid(format!("{label}.stitch.before and {label}.stitch.after must be 20 or less.")));
	}

	Ok(())
}

fn check_weight(label: &str, value: f32) -> Result<()> {
	if !value.is_finite() {
		return Err(invalid(format!("{label} must be a finite number.")));
	}
	if value < 0.0 {
		return Err(invalid(format!("{label} must be zero or greater.")));
	}

	Ok(())
}

fn invalid(message: impl Into<String>) -> Error {
	Error::Validation { message: message.into() }
}

fn normalize(cfg: &mut Config) {
	if cfg.storage.qdrant.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.storage.qdrant.api_key = None;
	}
	if cfg.providers.embedding.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false)
	{
		cfg.providers.embedding.api_key = None;
	}

	cfg.storage.qdrant.distance = normalize_distance(&cfg.storage.qdrant.distance);
	cfg.tokenizer.language = cfg.tokenizer.language.trim().to_lowercase();
	cfg.tokenizer.extra_stopwords = cfg
		.tokenizer
		.extra_stopwords
		.iter()
		.map(|word| word.trim().to_lowercase())
		.filter(|word| !word.is_empty())
		.collect();
}

fn normalize_distance(raw: &str) -> String {
	let lowered = raw.trim().to_lowercase();

	match lowered.as_str() {
		"cos" | "cosine" => "cosine".to_string(),
		"dot" | "dotproduct" | "ip" => "dot".to_string(),
		"l2" | "euclid" | "euclidean" => "euclid".to_string(),
		"l1" | "manhattan" => "manhattan".to_string(),
		_ => lowered,
	}
}
