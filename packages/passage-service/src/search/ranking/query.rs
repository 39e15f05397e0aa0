use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};
use passage_config::{Config, MAX_FUZZY_DISTANCE, MAX_WEIGHT_SUM};
use passage_domain::{
	phrase,
	tokenize::{self, TokenizerOptions},
};

/// Per-request ranking knobs layered over the process configuration.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RankingOverride {
	pub vector_weight: Option<f32>,
	pub lexical_weight: Option<f32>,
	pub fuzzy_weight: Option<f32>,
	pub fuzzy_max_distance: Option<u32>,
	pub mmr_lambda: Option<f32>,
}

/// Ranking settings in effect for one request.
#[derive(Clone, Debug, Serialize)]
pub struct ResolvedRanking {
	pub vector_weight: f32,
	pub lexical_weight: f32,
	pub fuzzy_weight: f32,
	pub fuzzy_max_distance: usize,
	pub fuzzy_min_term_chars: usize,
	pub fuzzy_max_text_words: usize,
	pub mmr_lambda: f32,
	pub phrase_text_bonus: f32,
	pub phrase_title_bonus: f32,
	pub title_bonus: f32,
	pub continuity_bonus: f32,
	pub definition_bonus: f32,
	pub early_chunk_bonus: f32,
	pub early_chunk_max_position: i64,
	pub boilerplate_penalty: f32,
	pub definition_text_markers: Vec<String>,
	pub boilerplate_markers: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct QueryContext {
	pub raw: String,
	pub normalized: String,
	/// Distinct tokens in query order.
	pub tokens: Vec<String>,
	/// Longest first.
	pub phrases: Vec<String>,
	pub definitional: bool,
	pub cited_sources: HashSet<String>,
	pub ranking: ResolvedRanking,
}

pub fn build_query_context(
	cfg: &Config,
	tokenizer: &TokenizerOptions,
	query: &str,
	overrides: Option<&RankingOverride>,
	cited_sources: &[String],
) -> Result<QueryContext> {
	let raw = query.trim();

	if raw.is_empty() {
		return Err(Error::EmptyQuery);
	}

	let normalized = tokenize::words(raw).join(" ");
	let tokens = tokenize::tokenize(raw, tokenizer);
	let phrases = phrase::derive_phrases(
		&tokens,
		cfg.phrases.max_ngram as usize,
		cfg.phrases.min_chars as usize,
		cfg.phrases.max_phrases as usize,
	);
	let definitional = cfg
		.ranking
		.heuristics
		.definition_query_markers
		.iter()
		.map(|marker| tokenize::normalize(marker))
		.any(|marker| !marker.is_empty() && normalized.contains(marker.as_str()));

	Ok(QueryContext {
		raw: raw.to_string(),
		normalized,
		tokens,
		phrases,
		definitional,
		cited_sources: cited_sources.iter().map(|source| source.trim().to_string()).collect(),
		ranking: resolve_ranking(cfg, overrides),
	})
}

pub fn resolve_ranking(cfg: &Config, overrides: Option<&RankingOverride>) -> ResolvedRanking {
	let weights = &cfg.ranking.weights;
	let heuristics = &cfg.ranking.heuristics;
	let mut vector_weight = weights.vector;
	let mut lexical_weight = weights.lexical;
	let mut fuzzy_weight = weights.fuzzy;
	let mut fuzzy_max_distance = cfg.ranking.fuzzy.max_distance;
	let mut mmr_lambda = cfg.diversity.mmr_lambda;

	if let Some(overrides) = overrides {
		vector_weight = override_weight("vector_weight", overrides.vector_weight, vector_weight);
		lexical_weight = override_weight("lexical_weight", overrides.lexical_weight, lexical_weight);
		fuzzy_weight = override_weight("fuzzy_weight", overrides.fuzzy_weight, fuzzy_weight);

		let sum = vector_weight + lexical_weight + fuzzy_weight;

		if sum <= 0.0 {
			tracing::warn!("Ranking override weights sum to zero. Using configured weights.");

			vector_weight = weights.vector;
			lexical_weight = weights.lexical;
			fuzzy_weight = weights.fuzzy;
		} else if sum > MAX_WEIGHT_SUM {
			let scale = MAX_WEIGHT_SUM / sum;

			tracing::warn!(sum, "Ranking override weights scaled down to the allowed sum.");

			vector_weight *= scale;
			lexical_weight *= scale;
			fuzzy_weight *= scale;
		}

		if let Some(distance) = overrides.fuzzy_max_distance {
			if distance > MAX_FUZZY_DISTANCE {
				tracing::warn!(distance, "Fuzzy distance override clamped.");
			}

			fuzzy_max_distance = distance.min(MAX_FUZZY_DISTANCE);
		}
		if let Some(lambda) = overrides.mmr_lambda {
			if lambda.is_finite() {
				if !(0.0..=1.0).contains(&lambda) {
					tracing::warn!(lambda, "MMR lambda override clamped.");
				}

				mmr_lambda = lambda.clamp(0.0, 1.0);
			} else {
				tracing::warn!("Ignoring non-finite MMR lambda override.");
			}
		}
	}

	ResolvedRanking {
		vector_weight,
		lexical_weight,
		fuzzy_weight,
		fuzzy_max_distance: fuzzy_max_distance as usize,
		fuzzy_min_term_chars: cfg.ranking.fuzzy.min_term_chars as usize,
		fuzzy_max_text_words: cfg.ranking.fuzzy.max_text_words as usize,
		mmr_lambda,
		phrase_text_bonus: heuristics.phrase_text,
		phrase_title_bonus: heuristics.phrase_title,
		title_bonus: heuristics.title,
		continuity_bonus: heuristics.continuity,
		definition_bonus: heuristics.definition,
		early_chunk_bonus: heuristics.early_chunk,
		early_chunk_max_position: i64::from(heuristics.early_chunk_max_position),
		boilerplate_penalty: heuristics.boilerplate_penalty,
		definition_text_markers: normalize_markers(&heuristics.definition_text_markers),
		boilerplate_markers: normalize_markers(&heuristics.boilerplate_markers),
	}
}

fn override_weight(label: &str, value: Option<f32>, fallback: f32) -> f32 {
	let Some(value) = value else { return fallback };

	if !value.is_finite() {
		tracing::warn!(field = label, "Ignoring non-finite weight override.");

		return fallback;
	}
	if value < 0.0 {
		tracing::warn!(field = label, value, "Negative weight override clamped to zero.");

		return 0.0;
	}

	value
}

fn normalize_markers(markers: &[String]) -> Vec<String> {
	markers
		.iter()
		.map(|marker| tokenize::words(marker).join(" "))
		.filter(|marker| !marker.is_empty())
		.collect()
}
