use serde::Serialize;

use crate::search::ranking::{query::QueryContext, scoring::ScoredCandidate};
use passage_config::Injection;
use passage_domain::{fuzzy, phrase, tokenize};

const MIN_TITLE_CHARS: usize = 3;
const MAX_PHRASE_GUESSES: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrigin {
	/// A title seen in the candidate pool.
	PoolTitle,
	/// A source name built from the query through a configured template.
	Template,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SourceTarget {
	pub source_id: String,
	pub origin: SourceOrigin,
	/// Further templated source names, tried in order when `source_id` has no chunks.
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub alternatives: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum InjectionDecision {
	Inject { target: SourceTarget },
	NoInject,
}

/// Finds the document the query most likely names.
pub fn detect_source(
	ctx: &QueryContext,
	pool: &[ScoredCandidate],
	cfg: &Injection,
) -> InjectionDecision {
	if !cfg.enabled {
		return InjectionDecision::NoInject;
	}

	let query_words: Vec<&str> = ctx.normalized.split(' ').filter(|word| !word.is_empty()).collect();

	if let Some(source_id) = title_in_pool(&query_words, pool, ctx.ranking.fuzzy_max_distance) {
		return InjectionDecision::Inject {
			target: SourceTarget {
				source_id,
				origin: SourceOrigin::PoolTitle,
				alternatives: Vec::new(),
			},
		};
	}

	let mut sources = templated_sources(ctx, &query_words, cfg).into_iter();

	match sources.next() {
		Some(source_id) => InjectionDecision::Inject {
			target: SourceTarget {
				source_id,
				origin: SourceOrigin::Template,
				alternatives: sources.collect(),
			},
		},
		None => InjectionDecision::NoInject,
	}
}

pub fn count_from_source(pool: &[ScoredCandidate], source: &str) -> usize {
	pool.iter().filter(|candidate| candidate.chunk().source == source).count()
}

/// Adds `bonus` to every pooled chunk of `source`. Returns how many chunks received it.
pub fn apply_bonus(pool: &mut [ScoredCandidate], source: &str, bonus: f32) -> usize {
	let mut applied = 0;

	for candidate in pool.iter_mut().filter(|candidate| candidate.chunk().source == source) {
		candidate.apply_injection_bonus(bonus);

		applied += 1;
	}

	applied
}

fn title_in_pool(query_words: &[&str], pool: &[ScoredCandidate], max_distance: usize) -> Option<String> {
	let padded_query = format!(" {} ", query_words.join(" "));
	let mut best: Option<(usize, &str)> = None;

	for candidate in pool {
		let chunk = candidate.chunk();
		let title_words = tokenize::title_words(&chunk.title);
		let title = title_words.join(" ");
		let chars = title.chars().count();

		if chars < MIN_TITLE_CHARS {
			continue;
		}

		let contained = padded_query.contains(&format!(" {title} "));
		let covered = title_words.iter().all(|word| {
			query_words.iter().any(|query_word| {
				let distance = if word.chars().count() > MIN_TITLE_CHARS { max_distance } else { 0 };

				fuzzy::approx_match(word, query_word, distance)
			})
		});

		if !contained && !covered {
			continue;
		}

		let better = match best {
			None => true,
			Some((best_chars, best_source)) =>
				chars > best_chars || (chars == best_chars && chunk.source.as_str() < best_source),
		};

		if better {
			best = Some((chars, chunk.source.as_str()));
		}
	}

	best.map(|(_, source)| source.to_string())
}

/// Source names from every template, filled with the query's title guess and then with guesses
/// from the leading phrases.
fn templated_sources(ctx: &QueryContext, query_words: &[&str], cfg: &Injection) -> Vec<String> {
	let max_words = cfg.max_title_words as usize;
	let words: Vec<String> = query_words.iter().map(|word| word.to_string()).collect();
	let mut guesses: Vec<String> = phrase::title_guess(&words, max_words).into_iter().collect();

	for text in ctx.phrases.iter().take(MAX_PHRASE_GUESSES) {
		let phrase_words: Vec<String> = text.split(' ').map(str::to_string).collect();

		if let Some(guess) = phrase::title_guess(&phrase_words, max_words)
			&& !guesses.contains(&guess)
		{
			guesses.push(guess);
		}
	}

	let mut sources: Vec<String> = Vec::new();

	for guess in &guesses {
		for source in phrase::expand_templates(&cfg.source_templates, guess) {
			if !sources.contains(&source) {
				sources.push(source);
			}
		}
	}

	sources
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;

	use super::*;
	use crate::search::ranking::{
		query::build_query_context,
		scoring::{self, ScoreBreakdown},
	};
	use passage_domain::tokenize::TokenizerOptions;
	use passage_storage::models::{Candidate, Chunk, Distance};

	fn cfg() -> passage_config::Config {
		passage_testkit::test_config(4).expect("Test config must be valid.")
	}

	fn context(query: &str) -> QueryContext {
		build_query_context(&cfg(), &TokenizerOptions::default(), query, None, &[])
			.expect("Query must build.")
	}

	fn pooled(source: &str, title: &str) -> ScoredCandidate {
		ScoredCandidate {
			candidate: Candidate {
				chunk: Chunk {
					id: format!("{source}#0"),
					source: source.to_string(),
					title: title.to_string(),
					position: 0,
					text: String::new(),
				},
				similarity: 0.5,
			},
			score: 0.5,
			breakdown: ScoreBreakdown::default(),
			exact_hits: 0,
			fuzzy_hits: 0,
			phrase_hit: false,
			title_hit: false,
			tokens: HashSet::new(),
		}
	}

	#[test]
	fn longest_pool_title_in_query_wins() {
		let ctx = context("алгоритм дейкстры на графах");
		let pool = vec![pooled("graphs.tex", "Графах"), pooled("dijkstra.tex", "Алгоритм_Дейкстры")];

		assert_eq!(
			detect_source(&ctx, &pool, &cfg().injection),
			InjectionDecision::Inject {
				target: SourceTarget {
					source_id: "dijkstra.tex".to_string(),
					origin: SourceOrigin::PoolTitle,
					alternatives: Vec::new(),
				}
			}
		);
	}

	#[test]
	fn inflected_title_is_covered() {
		let ctx = context("алгоритм дейкстра");
		let pool = vec![pooled("dijkstra.tex", "Алгоритм Дейкстры")];
		let decision = detect_source(&ctx, &pool, &cfg().injection);

		assert!(matches!(
			decision,
			InjectionDecision::Inject { target: SourceTarget { origin: SourceOrigin::PoolTitle, .. } }
		));
	}

	#[test]
	fn short_query_falls_back_to_template() {
		let ctx = context("поиск в ширину");
		let InjectionDecision::Inject { target } = detect_source(&ctx, &[], &cfg().injection) else {
			panic!("Expected an injection target.");
		};

		assert_eq!(target.origin, SourceOrigin::Template);
		assert_eq!(target.source_id, "Просмотр_исходного_текста_страницы_Поиск_В_Ширину.tex");
	}

	#[test]
	fn every_template_is_offered_in_order() {
		let mut injection = cfg().injection;

		injection.source_templates = vec!["{title}.md".to_string(), "{title}.tex".to_string()];

		let ctx = context("поиск в ширину");
		let InjectionDecision::Inject { target } = detect_source(&ctx, &[], &injection) else {
			panic!("Expected an injection target.");
		};

		assert_eq!(target.source_id, "Поиск_В_Ширину.md");
		assert_eq!(target.alternatives.first().map(String::as_str), Some("Поиск_В_Ширину.tex"));
		assert!(!target.alternatives.contains(&target.source_id));
	}

	#[test]
	fn long_query_without_title_uses_first_phrase() {
		let ctx = context("как работает поиск кратчайшего пути между двумя вершинами графа");
		let decision = detect_source(&ctx, &[], &cfg().injection);
		let InjectionDecision::Inject { target } = decision else {
			panic!("Expected an injection target.");
		};

		assert_eq!(target.origin, SourceOrigin::Template);
		assert!(target.source_id.starts_with("Просмотр_исходного_текста_страницы_"));
	}

	#[test]
	fn disabled_injection_never_injects() {
		let mut injection = cfg().injection;

		injection.enabled = false;

		let ctx = context("алгоритм дейкстры");
		let pool = vec![pooled("dijkstra.tex", "Алгоритм_Дейкстры")];

		assert_eq!(detect_source(&ctx, &pool, &injection), InjectionDecision::NoInject);
	}

	#[test]
	fn bonus_reaches_every_chunk_of_the_source() {
		let ctx = context("графы");
		let mut pool = scoring::score_pool(
			&ctx,
			vec![
				Candidate {
					chunk: Chunk {
						id: "a".to_string(),
						source: "g.tex".to_string(),
						title: "g".to_string(),
						position: 3,
						text: "графы".to_string(),
					},
					similarity: 0.1,
				},
				Candidate {
					chunk: Chunk {
						id: "b".to_string(),
						source: "h.tex".to_string(),
						title: "h".to_string(),
						position: 3,
						text: "графы".to_string(),
					},
					similarity: 0.1,
				},
			],
			Distance::Cosine,
			&TokenizerOptions::default(),
		);

		assert_eq!(apply_bonus(&mut pool, "g.tex", 0.3), 1);
		assert!(pool[0].score > pool[1].score);
		assert_eq!(count_from_source(&pool, "g.tex"), 1);
	}
}
