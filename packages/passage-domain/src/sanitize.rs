use std::sync::LazyLock;

use regex::Regex;

static HEADING: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"[ \t]*={2,}[ \t]*([^=\n]+?)[ \t]*={2,}[ \t]*").ok());
static TABLE_RULE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\|-+").ok());
static PIPES: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\|+").ok());
static TEMPLATE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\{\{[^}]*\}\}").ok());
static INLINE_SPACE: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").ok());
static BLANK_LINES: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"\n[ \t]*(\n[ \t]*)+").ok());

/// Strips wiki markup left over from page exports and collapses whitespace.
///
/// Headings such as `== Title ==` become their own line. Paragraph breaks survive as a single
/// blank line.
pub fn sanitize_context(text: &str) -> String {
	if text.trim().is_empty() {
		return String::new();
	}

	let mut text = text.replace("\r\n", "\n");

	for (pattern, replacement) in [
		(&HEADING, "\n$1\n"),
		(&TABLE_RULE, " "),
		(&PIPES, " "),
		(&TEMPLATE, " "),
		(&INLINE_SPACE, " "),
		(&BLANK_LINES, "\n\n"),
	] {
		let Some(re) = &**pattern else { continue };

		text = re.replace_all(&text, replacement).into_owned();
	}

	let lines: Vec<&str> = text.split('\n').map(str::trim).collect();

	lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn headings_become_lines() {
		assert_eq!(sanitize_context("intro == Графы == body"), "intro\nГрафы\nbody");
	}

	#[test]
	fn tables_and_templates_are_removed() {
		assert_eq!(sanitize_context("{|\n|-\n| a || b\n|}{{cite}} tail"), "{\n\na b\n} tail");
	}

	#[test]
	fn blank_runs_collapse() {
		assert_eq!(sanitize_context("a\n\n\n\n  b   c"), "a\n\nb c");
	}

	#[test]
	fn empty_input_stays_empty() {
		assert_eq!(sanitize_context("  \n\t"), "");
	}
}
