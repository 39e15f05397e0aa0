use std::collections::HashSet;

use serde::Serialize;

use crate::search::ranking::scoring::ScoredCandidate;
use passage_config::Expansion;

const MIN_EXTRA_FETCH: u64 = 80;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoExpandReason {
	Disabled,
	/// Enough of the pool already matches the query terms.
	SignalStrong,
	/// The index returned everything it had for the first fetch.
	IndexExhausted,
	/// The expanded limit would not exceed the first fetch.
	CapReached,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ExpansionDecision {
	Expand { limit: u64, score_threshold: Option<f32> },
	NoExpand { reason: NoExpandReason },
}

/// Share of pool candidates with at least one exact or approximate term hit.
pub fn term_hit_fraction(pool: &[ScoredCandidate]) -> f32 {
	if pool.is_empty() {
		return 0.0;
	}

	let hits = pool.iter().filter(|candidate| candidate.has_term_hit()).count();

	hits as f32 / pool.len() as f32
}

/// Decides whether a second, larger fetch is worth making.
///
/// `fetched` is how many points the first fetch returned and `requested` is its limit.
pub fn decide_expansion(
	pool: &[ScoredCandidate],
	fetched: usize,
	requested: u64,
	cfg: &Expansion,
) -> ExpansionDecision {
	if !cfg.enabled {
		return ExpansionDecision::NoExpand { reason: NoExpandReason::Disabled };
	}
	if !pool.is_empty() && term_hit_fraction(pool) >= cfg.min_hit_fraction {
		return ExpansionDecision::NoExpand { reason: NoExpandReason::SignalStrong };
	}
	if (fetched as u64) < requested && cfg.relaxed_score_threshold.is_none() {
		return ExpansionDecision::NoExpand { reason: NoExpandReason::IndexExhausted };
	}

	let limit = (requested * 2).max(requested + MIN_EXTRA_FETCH).min(u64::from(cfg.max_fetch));

	if limit <= requested {
		return ExpansionDecision::NoExpand { reason: NoExpandReason::CapReached };
	}

	ExpansionDecision::Expand { limit, score_threshold: cfg.relaxed_score_threshold }
}

/// Appends candidates whose ids are not yet pooled. Returns how many were added.
pub fn merge_new(pool: &mut Vec<ScoredCandidate>, incoming: Vec<ScoredCandidate>) -> usize {
	let mut seen: HashSet<String> = pool.iter().map(|candidate| candidate.chunk().id.clone()).collect();
	let before = pool.len();

	for candidate in incoming {
		if seen.insert(candidate.chunk().id.clone()) {
			pool.push(candidate);
		}
	}

	pool.len() - before
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::search::ranking::scoring::ScoreBreakdown;
	use passage_storage::models::{Candidate, Chunk};

	fn cfg() -> Expansion {
		Expansion { enabled: true, min_hit_fraction: 0.5, max_fetch: 500, relaxed_score_threshold: None }
	}

	fn pooled(id: &str, hit: bool) -> ScoredCandidate {
		ScoredCandidate {
			candidate: Candidate {
				chunk: Chunk {
					id: id.to_string(),
					source: "a.tex".to_string(),
					title: "a".to_string(),
					position: 0,
					text: String::new(),
				},
				similarity: 0.5,
			},
			score: 0.5,
			breakdown: ScoreBreakdown::default(),
			exact_hits: usize::from(hit),
			fuzzy_hits: 0,
			phrase_hit: false,
			title_hit: false,
			tokens: HashSet::new(),
		}
	}

	#[test]
	fn strong_signal_skips_expansion() {
		let pool = vec![pooled("a", true), pooled("b", false)];

		assert_eq!(
			decide_expansion(&pool, 50, 50, &cfg()),
			ExpansionDecision::NoExpand { reason: NoExpandReason::SignalStrong }
		);
	}

	#[test]
	fn weak_signal_doubles_or_adds_eighty() {
		let pool = vec![pooled("a", false), pooled("b", false)];

		assert_eq!(
			decide_expansion(&pool, 50, 50, &cfg()),
			ExpansionDecision::Expand { limit: 130, score_threshold: None }
		);
		assert_eq!(
			decide_expansion(&pool, 200, 200, &cfg()),
			ExpansionDecision::Expand { limit: 400, score_threshold: None }
		);
	}

	#[test]
	fn short_first_fetch_means_exhausted() {
		let pool = vec![pooled("a", false)];

		assert_eq!(
			decide_expansion(&pool, 1, 50, &cfg()),
			ExpansionDecision::NoExpand { reason: NoExpandReason::IndexExhausted }
		);

		let relaxed = Expansion { relaxed_score_threshold: Some(0.1), ..cfg() };

		assert_eq!(
			decide_expansion(&pool, 1, 50, &relaxed),
			ExpansionDecision::Expand { limit: 130, score_threshold: Some(0.1) }
		);
	}

	#[test]
	fn cap_blocks_expansion() {
		let pool = vec![pooled("a", false)];
		let capped = Expansion { max_fetch: 100, ..cfg() };

		assert_eq!(
			decide_expansion(&pool, 100, 100, &capped),
			ExpansionDecision::NoExpand { reason: NoExpandReason::CapReached }
		);
	}

	#[test]
	fn merge_skips_known_ids() {
		let mut pool = vec![pooled("a", false)];
		let added = merge_new(&mut pool, vec![pooled("a", true), pooled("b", true), pooled("b", true)]);

		assert_eq!(added, 1);
		assert_eq!(pool.len(), 2);
	}
}
