use std::collections::HashSet;

use unicode_script::{Script, UnicodeScript};

const RUSSIAN_SUFFIXES: &[&str] = &[
	"ами", "ями", "его", "ого", "ему", "ому", "ыми", "ими", "ых", "их", "ой", "ей", "ый", "ий", "ая",
	"ое", "ую", "ам", "ям", "ах", "ях", "ов", "ев", "ом", "ем", "ым", "им", "а", "я", "ы", "и", "у",
	"ю", "о", "е", "й", "ь",
];
const MIN_STEM_CHARS: usize = 3;

/// Returns whether the edit distance between `term` and `candidate` is at most `max_distance`.
///
/// Only the diagonal band of width `max_distance` is computed and the scan stops as soon as a
/// whole row exceeds the bound.
pub fn approx_match(term: &str, candidate: &str, max_distance: usize) -> bool {
	bounded_distance(term, candidate, max_distance).is_some()
}

/// Levenshtein distance over Unicode scalar values, or `None` once it exceeds `max_distance`.
pub fn bounded_distance(a: &str, b: &str, max_distance: usize) -> Option<usize> {
	if a == b {
		return Some(0);
	}

	let a: Vec<char> = a.chars().collect();
	let b: Vec<char> = b.chars().collect();
	let (n, m) = (a.len(), b.len());

	if n.abs_diff(m) > max_distance {
		return None;
	}

	let over = max_distance + 1;
	let mut prev = vec![over; m + 1];
	let mut curr = vec![over; m + 1];

	for (j, cell) in prev.iter_mut().enumerate().take(m.min(max_distance) + 1) {
		*cell = j;
	}

	for i in 1..=n {
		let lo = i.saturating_sub(max_distance).max(1);
		let hi = (i + max_distance).min(m);

		curr[lo - 1] = if lo == 1 { i.min(over) } else { over };

		if hi < m {
			curr[hi + 1] = over;
		}

		let mut row_min = curr[lo - 1];

		for j in lo..=hi {
			let cost = usize::from(a[i - 1] != b[j - 1]);
			let value = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost).min(over);

			curr[j] = value;
			row_min = row_min.min(value);
		}

		if row_min > max_distance {
			return None;
		}

		std::mem::swap(&mut prev, &mut curr);
	}

	let distance = prev[m];

	(distance <= max_distance).then_some(distance)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TermMatch {
	Exact,
	Approximate,
	Miss,
}

/// Matches one query token against a chunk: exactly against `vocabulary`, otherwise within
/// `max_distance` edits of a word in `scope`. Tokens shorter than `min_fuzzy_chars` only match
/// exactly.
pub fn match_term(
	token: &str,
	vocabulary: &HashSet<&str>,
	scope: &[&str],
	max_distance: usize,
	min_fuzzy_chars: usize,
) -> TermMatch {
	if vocabulary.contains(token) {
		return TermMatch::Exact;
	}
	if max_distance == 0 || token.chars().count() < min_fuzzy_chars {
		return TermMatch::Miss;
	}
	if scope.iter().any(|word| approx_match(token, word, max_distance)) {
		return TermMatch::Approximate;
	}

	TermMatch::Miss
}

/// The token plus its stems with one common Russian inflection removed.
pub fn stem_variants(token: &str) -> Vec<String> {
	let mut variants = vec![token.to_string()];

	if !is_cyrillic(token) {
		return variants;
	}

	let chars = token.chars().count();

	for suffix in RUSSIAN_SUFFIXES {
		let suffix_chars = suffix.chars().count();

		if chars < suffix_chars + MIN_STEM_CHARS {
			continue;
		}

		if let Some(stem) = token.strip_suffix(suffix)
			&& !variants.iter().any(|variant| variant == stem)
		{
			variants.push(stem.to_string());
		}
	}

	variants
}

/// Substring check that tolerates inflection of `token`. `haystack` must already be normalized.
pub fn approx_contains(haystack: &str, token: &str) -> bool {
	if haystack.is_empty() || token.is_empty() {
		return false;
	}

	stem_variants(token).iter().any(|variant| haystack.contains(variant.as_str()))
}

fn is_cyrillic(token: &str) -> bool {
	token.chars().any(|ch| ch.script() == Script::Cyrillic)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn distance_matches_reference_values() {
		assert_eq!(bounded_distance("kitten", "sitting", 3), Some(3));
		assert_eq!(bounded_distance("kitten", "sitting", 2), None);
		assert_eq!(bounded_distance("", "abc", 3), Some(3));
		assert_eq!(bounded_distance("дейкстры", "дейкстра", 1), Some(1));
	}

	#[test]
	fn approx_match_is_reflexive() {
		for term in ["", "a", "граф", "dijkstra"] {
			for distance in 0..3 {
				assert!(approx_match(term, term, distance));
			}
		}
	}

	#[test]
	fn approx_match_is_symmetric() {
		let words = ["graph", "grape", "graphs", "garph", "поиск", "поиска", "x"];

		for a in words {
			for b in words {
				for distance in 0..3 {
					assert_eq!(approx_match(a, b, distance), approx_match(b, a, distance), "{a} {b}");
				}
			}
		}
	}

	#[test]
	fn approx_match_rejects_length_gap() {
		assert!(!approx_match("tree", "treehouse", 2));
	}

	#[test]
	fn stems_only_apply_to_cyrillic() {
		assert_eq!(stem_variants("graphs"), vec!["graphs"]);
		assert!(stem_variants("дейкстры").contains(&"дейкстр".to_string()));
	}

	#[test]
	fn approx_contains_tolerates_inflection() {
		assert!(approx_contains("алгоритм дейкстра", "дейкстры"));
		assert!(!approx_contains("алгоритм прима", "дейкстры"));
	}

	#[test]
	fn term_match_uses_fuzzy_bound() {
		let words = ["dijkstra", "graph"];
		let vocabulary: HashSet<&str> = words.into_iter().collect();

		assert_eq!(match_term("graph", &vocabulary, &words, 1, 5), TermMatch::Exact);
		assert_eq!(match_term("dijkstre", &vocabulary, &words, 1, 5), TermMatch::Approximate);
		assert_eq!(match_term("dijkstre", &vocabulary, &words, 0, 5), TermMatch::Miss);
		assert_eq!(match_term("grap", &vocabulary, &words, 1, 5), TermMatch::Miss);
	}
}
