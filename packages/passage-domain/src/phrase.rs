/// Phrases from sliding token windows, longest first.
///
/// Windows run from `max_ngram` tokens down to two. When no window reaches `min_chars`, single
/// tokens of that length stand in. Ties keep the order in which the phrase first appears.
pub fn derive_phrases(
	tokens: &[String],
	max_ngram: usize,
	min_chars: usize,
	max_phrases: usize,
) -> Vec<String> {
	let mut phrases: Vec<(usize, String)> = Vec::new();
	let top = max_ngram.min(tokens.len());

	for size in (2..=top).rev() {
		for window in tokens.windows(size) {
			let phrase = window.join(" ");

			if phrase.chars().count() < min_chars {
				continue;
			}
			if phrases.iter().any(|(_, existing)| existing == &phrase) {
				continue;
			}

			phrases.push((size, phrase));
		}
	}

	if phrases.is_empty() {
		for token in tokens {
			if token.chars().count() >= min_chars {
				phrases.push((1, token.clone()));
			}
		}
	}

	phrases.sort_by(|(a_size, a), (b_size, b)| {
		b_size.cmp(a_size).then_with(|| b.chars().count().cmp(&a.chars().count()))
	});
	phrases.truncate(max_phrases);

	phrases.into_iter().map(|(_, phrase)| phrase).collect()
}

/// Capitalizes each word and joins them with `_`, the way exported page titles are named.
pub fn title_guess(words: &[String], max_words: usize) -> Option<String> {
	if words.is_empty() || words.len() > max_words {
		return None;
	}

	let parts: Vec<String> = words.iter().map(|word| capitalize(word)).collect();

	Some(parts.join("_"))
}

/// Fills every template's `{title}` placeholder with `title`.
pub fn expand_templates(templates: &[String], title: &str) -> Vec<String> {
	templates.iter().map(|template| template.replace("{title}", title)).collect()
}

fn capitalize(word: &str) -> String {
	let mut chars = word.chars();

	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}
