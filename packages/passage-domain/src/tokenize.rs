use std::collections::HashSet;

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;
use whatlang::Lang;

const RUSSIAN_STOPWORDS: &[&str] = &[
	"алгоритм",
	"алгоритма",
	"алгоритмы",
	"алгоритмов",
	"более",
	"будет",
	"были",
	"было",
	"быть",
	"весь",
	"всех",
	"даже",
	"если",
	"есть",
	"значит",
	"именно",
	"каждый",
	"какая",
	"какие",
	"какой",
	"когда",
	"который",
	"которые",
	"лишь",
	"между",
	"менее",
	"может",
	"можно",
	"нужно",
	"один",
	"одна",
	"одно",
	"однако",
	"после",
	"потому",
	"почему",
	"также",
	"такой",
	"тогда",
	"только",
	"чтобы",
	"через",
	"этого",
	"этой",
	"этот",
];
const ENGLISH_STOPWORDS: &[&str] = &[
	"about",
	"after",
	"algorithm",
	"also",
	"been",
	"before",
	"being",
	"between",
	"both",
	"does",
	"each",
	"from",
	"have",
	"into",
	"more",
	"most",
	"only",
	"other",
	"over",
	"some",
	"such",
	"than",
	"that",
	"their",
	"them",
	"then",
	"there",
	"these",
	"they",
	"this",
	"those",
	"very",
	"were",
	"what",
	"when",
	"where",
	"which",
	"while",
	"will",
	"with",
	"would",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Language {
	/// Detects the language per text and falls back to every known stopword list.
	Auto,
	Russian,
	English,
}
impl Language {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_lowercase().as_str() {
			"auto" => Some(Self::Auto),
			"ru" => Some(Self::Russian),
			"en" => Some(Self::English),
			_ => None,
		}
	}
}

#[derive(Clone, Debug)]
pub struct TokenizerOptions {
	pub language: Language,
	pub min_token_chars: usize,
	pub extra_stopwords: HashSet<String>,
}
impl TokenizerOptions {
	pub fn from_config(cfg: &passage_config::Tokenizer) -> Self {
		Self {
			language: Language::parse(&cfg.language).unwrap_or(Language::Auto),
			min_token_chars: cfg.min_token_chars as usize,
			extra_stopwords: cfg.extra_stopwords.iter().map(|word| normalize(word)).collect(),
		}
	}

	fn is_stopword(&self, token: &str, language: Language) -> bool {
		if self.extra_stopwords.contains(token) {
			return true;
		}

		match language {
			Language::Russian => RUSSIAN_STOPWORDS.contains(&token),
			Language::English => ENGLISH_STOPWORDS.contains(&token),
			Language::Auto =>
				RUSSIAN_STOPWORDS.contains(&token) || ENGLISH_STOPWORDS.contains(&token),
		}
	}
}
impl Default for TokenizerOptions {
	fn default() -> Self {
		Self { language: Language::Auto, min_token_chars: 4, extra_stopwords: HashSet::new() }
	}
}

/// NFKC-normalizes and case-folds text. `ё` folds to `е`.
pub fn normalize(text: &str) -> String {
	text.nfkc().flat_map(char::to_lowercase).map(|ch| if ch == 'ё' { 'е' } else { ch }).collect()
}

/// Every normalized word of `text`, in order, with punctuation stripped.
pub fn words(text: &str) -> Vec<String> {
	let normalized = normalize(text);

	normalized
		.unicode_words()
		.map(|word| word.chars().filter(|ch| ch.is_alphanumeric()).collect::<String>())
		.filter(|word| !word.is_empty())
		.collect()
}

/// Words of a document title. Underscores separate words, as in exported page names.
pub fn title_words(title: &str) -> Vec<String> {
	words(&title.replace('_', " "))
}

/// Normalized, stopword-filtered tokens deduplicated in first-occurrence order.
pub fn tokenize(text: &str, options: &TokenizerOptions) -> Vec<String> {
	let language = match options.language {
		Language::Auto => detect_language(text),
		language => language,
	};
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for word in words(text) {
		if word.chars().count() < options.min_token_chars {
			continue;
		}
		if options.is_stopword(&word, language) {
			continue;
		}
		if seen.insert(word.clone()) {
			out.push(word);
		}
	}

	out
}

/// Distinct tokens of a chunk for overlap measures. Skips language detection and applies every
/// stopword list.
pub fn token_set(text: &str, options: &TokenizerOptions) -> HashSet<String> {
	words(text)
		.into_iter()
		.filter(|word| word.chars().count() >= options.min_token_chars)
		.filter(|word| !options.is_stopword(word, Language::Auto))
		.collect()
}

fn detect_language(text: &str) -> Language {
	let Some(info) = whatlang::detect(text) else { return Language::Auto };

	if !info.is_reliable() {
		return Language::Auto;
	}

	match info.lang() {
		Lang::Rus => Language::Russian,
		Lang::Eng => Language::English,
		_ => Language::Auto,
	}
}
