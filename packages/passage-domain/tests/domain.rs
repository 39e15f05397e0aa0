use std::collections::HashSet;

use passage_domain::{
	fuzzy::{self, TermMatch},
	phrase, sanitize,
	tokenize::{self, TokenizerOptions},
};

#[test]
fn query_words_name_a_source_page() {
	let words = tokenize::words("поиск в ширину");
	let title = phrase::title_guess(&words, 4).expect("Three words fit the title limit.");
	let templates = vec!["Просмотр_исходного_текста_страницы_{title}.tex".to_string()];

	assert_eq!(
		phrase::expand_templates(&templates, &title),
		vec!["Просмотр_исходного_текста_страницы_Поиск_В_Ширину.tex".to_string()]
	);
	assert_eq!(phrase::title_guess(&tokenize::words("a b c d e"), 4), None);
}

#[test]
fn inflected_terms_still_hit() {
	let options = TokenizerOptions::default();
	let query = tokenize::tokenize("дейкстры", &options);
	let words = tokenize::words("Алгоритм Дейкстра работает на неотрицательных весах.");
	let scope: Vec<&str> = words.iter().map(String::as_str).collect();
	let vocabulary: HashSet<&str> = scope.iter().copied().collect();

	assert_eq!(query, vec!["дейкстры".to_string()]);
	assert_eq!(fuzzy::match_term(&query[0], &vocabulary, &scope, 1, 5), TermMatch::Approximate);
	assert_eq!(fuzzy::match_term(&query[0], &vocabulary, &scope, 0, 5), TermMatch::Miss);
	assert!(fuzzy::approx_contains("кратчайший путь в графе", "кратчайшего"));
}

#[test]
fn case_and_yo_fold_together() {
	assert_eq!(tokenize::words("Ёлка, ЁЖ!"), vec!["елка".to_string(), "еж".to_string()]);
	assert_eq!(tokenize::title_words("Алгоритм_Дейкстры"), vec!["алгоритм", "дейкстры"]);
}

#[test]
fn phrases_prefer_longer_windows() {
	let tokens: Vec<String> =
		["кратчайший", "путь", "графе"].iter().map(|token| token.to_string()).collect();

	assert_eq!(
		phrase::derive_phrases(&tokens, 3, 6, 2),
		vec!["кратчайший путь графе".to_string(), "кратчайший путь".to_string()]
	);
}

#[test]
fn exported_markup_is_flattened() {
	let text = "== Обход ==\n\n\n{{шаблон}} Вершины   посещаются || по очереди.";

	assert_eq!(sanitize::sanitize_context(text), "Обход\n\nВершины посещаются по очереди.");
}
