use std::collections::HashSet;

use serde::Serialize;

use crate::search::ranking::query::QueryContext;
use passage_domain::{
	fuzzy::{self, TermMatch},
	tokenize::{self, TokenizerOptions},
};
use passage_storage::models::{Candidate, Chunk, Distance};

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
	pub vector_similarity: f32,
	pub vector_term: f32,
	pub lexical_overlap: f32,
	pub lexical_term: f32,
	pub fuzzy_overlap: f32,
	pub fuzzy_term: f32,
	pub phrase_bonus: f32,
	pub title_bonus: f32,
	pub continuity_bonus: f32,
	pub definition_bonus: f32,
	pub position_bonus: f32,
	pub boilerplate_penalty: f32,
	pub injection_bonus: f32,
}
impl ScoreBreakdown {
	pub fn heuristic_bonus(&self) -> f32 {
		self.phrase_bonus
			+ self.title_bonus
			+ self.continuity_bonus
			+ self.definition_bonus
			+ self.position_bonus
			+ self.injection_bonus
			- self.boilerplate_penalty
	}

	pub fn total(&self) -> f32 {
		self.vector_term + self.lexical_term + self.fuzzy_term + self.heuristic_bonus()
	}
}

#[derive(Clone, Debug)]
pub struct ScoredCandidate {
	pub candidate: Candidate,
	pub score: f32,
	pub breakdown: ScoreBreakdown,
	pub exact_hits: usize,
	pub fuzzy_hits: usize,
	pub phrase_hit: bool,
	pub title_hit: bool,
	/// Content tokens of the chunk text, used for redundancy.
	pub tokens: HashSet<String>,
}
impl ScoredCandidate {
	pub fn chunk(&self) -> &Chunk {
		&self.candidate.chunk
	}

	/// Whether the query matched the chunk by token, phrase, or title.
	pub fn has_term_hit(&self) -> bool {
		self.exact_hits > 0 || self.fuzzy_hits > 0 || self.phrase_hit || self.title_hit
	}

	/// Adds the source-injection bonus once; repeated calls keep the larger value.
	pub fn apply_injection_bonus(&mut self, bonus: f32) {
		if bonus <= self.breakdown.injection_bonus {
			return;
		}

		self.breakdown.injection_bonus = bonus;
		self.score = self.breakdown.total();
	}
}

/// Maps a raw index score into `[0, 1]`, higher meaning closer. Monotonic per metric.
pub fn normalize_similarity(raw: f32, distance: Distance) -> f32 {
	if !raw.is_finite() {
		return 0.0;
	}

	match distance {
		Distance::Cosine => raw.clamp(0.0, 1.0),
		Distance::Dot => 1.0 / (1.0 + (-raw).exp()),
		Distance::Euclid | Distance::Manhattan => 1.0 / (1.0 + raw.max(0.0)),
	}
}

pub fn score(
	ctx: &QueryContext,
	candidate: Candidate,
	distance: Distance,
	tokenizer: &TokenizerOptions,
) -> ScoredCandidate {
	let ranking = &ctx.ranking;
	let chunk = &candidate.chunk;
	let text_words = tokenize::words(&chunk.text);
	let title_words = tokenize::title_words(&chunk.title);
	let title_text = title_words.join(" ");
	let vocabulary: HashSet<&str> =
		text_words.iter().chain(title_words.iter()).map(String::as_str).collect();
	let fuzzy_scope: Vec<&str> = text_words
		.iter()
		.take(ranking.fuzzy_max_text_words)
		.chain(title_words.iter())
		.map(String::as_str)
		.collect();
	let mut exact_hits = 0;
	let mut fuzzy_hits = 0;

	for token in &ctx.tokens {
		match fuzzy::match_term(
			token,
			&vocabulary,
			&fuzzy_scope,
			ranking.fuzzy_max_distance,
			ranking.fuzzy_min_term_chars,
		) {
			TermMatch::Exact => exact_hits += 1,
			TermMatch::Approximate => fuzzy_hits += 1,
			TermMatch::Miss => {},
		}
	}

	let token_count = ctx.tokens.len();
	let overlap = |hits: usize| if token_count == 0 { 0.0 } else { hits as f32 / token_count as f32 };
	let vector_similarity = normalize_similarity(candidate.similarity, distance);
	let lexical_overlap = overlap(exact_hits);
	let fuzzy_overlap = overlap(fuzzy_hits);
	// Padded so phrase containment respects word boundaries.
	let padded_text = format!(" {} ", text_words.join(" "));
	let padded_title = format!(" {title_text} ");
	let phrase_in_text =
		ctx.phrases.iter().any(|phrase| padded_text.contains(&format!(" {phrase} ")));
	let phrase_in_title = ctx.phrases.iter().any(|phrase| padded_title.contains(&format!(" {phrase} ")))
		|| (token_count > 0 && ctx.tokens.iter().all(|token| title_words.contains(token)));
	let mut phrase_bonus = 0.0;

	if phrase_in_text {
		phrase_bonus += ranking.phrase_text_bonus;
	}
	if phrase_in_title {
		phrase_bonus += ranking.phrase_title_bonus;
	}

	let title_matches =
		ctx.tokens.iter().filter(|token| fuzzy::approx_contains(&title_text, token)).count();
	let title_bonus = ranking.title_bonus * overlap(title_matches);
	let continuity_bonus = if ctx.cited_sources.contains(&chunk.source) {
		ranking.continuity_bonus
	} else {
		0.0
	};
	// Definition markers are stems, so they match inside words.
	let definition_bonus = if ctx.definitional
		&& ranking.definition_text_markers.iter().any(|marker| {
			padded_text.contains(marker.as_str()) || padded_title.contains(marker.as_str())
		}) {
		ranking.definition_bonus
	} else {
		0.0
	};
	let position_bonus = if chunk.position >= 0 && chunk.position <= ranking.early_chunk_max_position
	{
		ranking.early_chunk_bonus
	} else {
		0.0
	};
	let boilerplate_penalty = if ranking
		.boilerplate_markers
		.iter()
		.any(|marker| padded_text.contains(&format!(" {marker} ")))
	{
		ranking.boilerplate_penalty
	} else {
		0.0
	};
	let breakdown = ScoreBreakdown {
		vector_similarity,
		vector_term: ranking.vector_weight * vector_similarity,
		lexical_overlap,
		lexical_term: ranking.lexical_weight * lexical_overlap,
		fuzzy_overlap,
		fuzzy_term: ranking.fuzzy_weight * fuzzy_overlap,
		phrase_bonus,
		title_bonus,
		continuity_bonus,
		definition_bonus,
		position_bonus,
		boilerplate_penalty,
		injection_bonus: 0.0,
	};
	let tokens = tokenize::token_set(&chunk.text, tokenizer);

	ScoredCandidate {
		score: breakdown.total(),
		breakdown,
		exact_hits,
		fuzzy_hits,
		phrase_hit: phrase_in_text || phrase_in_title,
		title_hit: title_matches > 0,
		tokens,
		candidate,
	}
}

pub fn score_pool(
	ctx: &QueryContext,
	candidates: Vec<Candidate>,
	distance: Distance,
	tokenizer: &TokenizerOptions,
) -> Vec<ScoredCandidate> {
	candidates.into_iter().map(|candidate| score(ctx, candidate, distance, tokenizer)).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::search::ranking::query::{RankingOverride, build_query_context};

	fn config() -> passage_config::Config {
		passage_testkit::test_config(4).expect("Test config must be valid.")
	}

	fn candidate(id: &str, title: &str, position: i64, text: &str, similarity: f32) -> Candidate {
		Candidate {
			chunk: Chunk {
				id: id.to_string(),
				source: format!("{title}.tex"),
				title: title.to_string(),
				position,
				text: text.to_string(),
			},
			similarity,
		}
	}

	fn context(query: &str, overrides: Option<&RankingOverride>) -> QueryContext {
		build_query_context(&config(), &TokenizerOptions::default(), query, overrides, &[])
			.expect("Query must build.")
	}

	#[test]
	fn similarity_normalization_is_monotonic() {
		for distance in [Distance::Cosine, Distance::Dot] {
			assert!(normalize_similarity(0.2, distance) <= normalize_similarity(0.8, distance));
		}
		for distance in [Distance::Euclid, Distance::Manhattan] {
			assert!(normalize_similarity(0.2, distance) >= normalize_similarity(0.8, distance));
		}

		assert_eq!(normalize_similarity(1.5, Distance::Cosine), 1.0);
		assert_eq!(normalize_similarity(f32::NAN, Distance::Dot), 0.0);
	}

	#[test]
	fn exact_and_fuzzy_hits_are_counted_separately() {
		let ctx = context("дейкстры кратчайший", None);
		let scored = score(
			&ctx,
			candidate("a", "Графы", 5, "Алгоритм Дейкстра ищет кратчайший путь.", 0.5),
			Distance::Cosine,
			&TokenizerOptions::default(),
		);

		assert_eq!(scored.exact_hits, 1);
		assert_eq!(scored.fuzzy_hits, 1);
		assert!(scored.has_term_hit());
		assert!((scored.breakdown.lexical_overlap - 0.5).abs() < 1e-6);
	}

	#[test]
	fn phrase_in_text_outranks_scattered_tokens() {
		let ctx = context("кратчайший путь графа", None);
		let tokenizer = TokenizerOptions::default();
		let phrased = score(
			&ctx,
			candidate("a", "Графы", 5, "Ищем кратчайший путь графа от вершины.", 0.5),
			Distance::Cosine,
			&tokenizer,
		);
		let scattered = score(
			&ctx,
			candidate("b", "Графы", 5, "Путь графа бывает кратчайший или нет.", 0.5),
			Distance::Cosine,
			&tokenizer,
		);

		assert!(phrased.phrase_hit);
		assert!(phrased.score > scattered.score);
	}

	#[test]
	fn vector_weight_keeps_order_monotonic() {
		let tokenizer = TokenizerOptions::default();

		for weight in [0.5_f32, 1.0, 2.0, 4.0] {
			let overrides = RankingOverride { vector_weight: Some(weight), ..Default::default() };
			let ctx = context("маршрут", Some(&overrides));
			let low = score(&ctx, candidate("a", "X", 9, "нет совпадений", 0.3), Distance::Cosine, &tokenizer);
			let high = score(&ctx, candidate("b", "X", 9, "нет совпадений", 0.7), Distance::Cosine, &tokenizer);

			assert!(high.score > low.score);
		}
	}

	#[test]
	fn definition_marker_matches_inflected_words() {
		let ctx = context("что такое граф", None);
		let tokenizer = TokenizerOptions::default();
		let defining = score(
			&ctx,
			candidate("a", "Графы", 7, "Определение: граф это пара множеств.", 0.5),
			Distance::Cosine,
			&tokenizer,
		);
		let plain = score(
			&ctx,
			candidate("b", "Графы", 7, "Граф можно нарисовать на плоскости.", 0.5),
			Distance::Cosine,
			&tokenizer,
		);

		assert!(ctx.definitional);
		assert!((defining.breakdown.definition_bonus - ctx.ranking.definition_bonus).abs() < 1e-6);
		assert!(defining.breakdown.definition_bonus > 0.0);
		assert_eq!(plain.breakdown.definition_bonus, 0.0);
	}

	#[test]
	fn injection_bonus_is_applied_once() {
		let ctx = context("графы", None);
		let mut scored = score(
			&ctx,
			candidate("a", "Графы", 0, "Графы и деревья.", 0.5),
			Distance::Cosine,
			&TokenizerOptions::default(),
		);
		let before = scored.score;

		scored.apply_injection_bonus(0.3);
		scored.apply_injection_bonus(0.3);

		assert!((scored.score - before - 0.3).abs() < 1e-5);
	}
}
