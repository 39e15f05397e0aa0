use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub tokenizer: Tokenizer,
	#[serde(default)]
	pub phrases: Phrases,
	#[serde(default)]
	pub ranking: Ranking,
	#[serde(default)]
	pub expansion: Expansion,
	#[serde(default)]
	pub injection: Injection,
	#[serde(default)]
	pub diversity: Diversity,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub rag: Rag,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
	/// One of cosine, dot, euclid, or manhattan. Common aliases are normalized on load.
	#[serde(default = "default_distance")]
	pub distance: String,
	#[serde(default = "default_qdrant_timeout_ms")]
	pub timeout_ms: u64,
	pub api_key: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: Option<String>,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Tokenizer {
	/// One of auto, ru, or en.
	pub language: String,
	pub min_token_chars: u32,
	pub extra_stopwords: Vec<String>,
}
impl Default for Tokenizer {
	fn default() -> Self {
		Self { language: "auto".to_string(), min_token_chars: 4, extra_stopwords: Vec::new() }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Phrases {
	pub max_ngram: u32,
	pub min_chars: u32,
	pub max_phrases: u32,
}
impl Default for Phrases {
	fn default() -> Self {
		Self { max_ngram: 3, min_chars: 6, max_phrases: 2 }
	}
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Ranking {
	pub weights: RankingWeights,
	pub fuzzy: RankingFuzzy,
	pub heuristics: RankingHeuristics,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
	pub vector: f32,
	pub lexical: f32,
	pub fuzzy: f32,
}
impl Default for RankingWeights {
	fn default() -> Self {
		Self { vector: 1.0, lexical: 0.6, fuzzy: 0.3 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RankingFuzzy {
	pub max_distance: u32,
	/// Query tokens shorter than this only count when matched exactly.
	pub min_term_chars: u32,
	pub max_text_words: u32,
}
impl Default for RankingFuzzy {
	fn default() -> Self {
		Self { max_distance: 1, min_term_chars: 5, max_text_words: 300 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RankingHeuristics {
	pub phrase_text: f32,
	pub phrase_title: f32,
	pub title: f32,
	pub continuity: f32,
	pub definition: f32,
	pub early_chunk: f32,
	pub early_chunk_max_position: u32,
	pub boilerplate_penalty: f32,
	pub definition_query_markers: Vec<String>,
	pub definition_text_markers: Vec<String>,
	pub boilerplate_markers: Vec<String>,
}
impl Default for RankingHeuristics {
	fn default() -> Self {
		Self {
			phrase_text: 0.35,
			phrase_title: 0.5,
			title: 0.25,
			continuity: 0.1,
			definition: 0.15,
			early_chunk: 0.05,
			early_chunk_max_position: 1,
			boilerplate_penalty: 0.2,
			definition_query_markers: strings(&["что такое", "определени", "definition", "define"]),
			definition_text_markers: strings(&["определени", "называется", "definition", "is defined"]),
			boilerplate_markers: strings(&[
				"просмотр исходного текста",
				"список литературы",
				"table of contents",
				"references",
			]),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Expansion {
	pub enabled: bool,
	pub min_hit_fraction: f32,
	pub max_fetch: u32,
	pub relaxed_score_threshold: Option<f32>,
}
impl Default for Expansion {
	fn default() -> Self {
		Self { enabled: true, min_hit_fraction: 0.1, max_fetch: 500, relaxed_score_threshold: None }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Injection {
	pub enabled: bool,
	pub floor: u32,
	pub fetch_limit: u32,
	pub bonus: f32,
	pub max_title_words: u32,
	/// Patterns with a `{title}` placeholder that map a title guess to a source id.
	pub source_templates: Vec<String>,
}
impl Default for Injection {
	fn default() -> Self {
		Self {
			enabled: true,
			floor: 3,
			fetch_limit: 40,
			bonus: 0.3,
			max_title_words: 4,
			source_templates: strings(&["Просмотр_исходного_текста_страницы_{title}.tex"]),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Diversity {
	pub enabled: bool,
	pub mmr_lambda: f32,
}
impl Default for Diversity {
	fn default() -> Self {
		Self { enabled: true, mmr_lambda: 0.7 }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Candidates {
	pub multiplier: u32,
	pub min: u32,
	pub max: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Stitch {
	pub enabled: bool,
	pub stitch_after_chars: u32,
	pub max_chars: u32,
	pub before: u32,
	pub after: u32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	pub default_limit: u32,
	pub max_limit: u32,
	pub score_threshold: Option<f32>,
	pub candidates: Candidates,
	pub stitch: Stitch,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			default_limit: 5,
			max_limit: 50,
			score_threshold: None,
			candidates: Candidates { multiplier: 10, min: 50, max: 200 },
			stitch: Stitch {
				enabled: true,
				stitch_after_chars: 200,
				max_chars: 800,
				before: 1,
				after: 2,
			},
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Rag {
	pub default_limit: u32,
	pub max_limit: u32,
	pub context_chars: u32,
	pub max_context_chars: u32,
	pub require_term_hit: bool,
	pub candidates: Candidates,
	pub stitch: Stitch,
}
impl Default for Rag {
	fn default() -> Self {
		Self {
			default_limit: 5,
			max_limit: 20,
			context_chars: 2_000,
			max_context_chars: 10_000,
			require_term_hit: true,
			candidates: Candidates { multiplier: 24, min: 60, max: 240 },
			stitch: Stitch {
				enabled: true,
				stitch_after_chars: 600,
				max_chars: 1_800,
				before: 2,
				after: 8,
			},
		}
	}
}

fn strings(values: &[&str]) -> Vec<String> {
	values.iter().map(|value| value.to_string()).collect()
}

fn default_distance() -> String {
	"cosine".to_string()
}

fn default_qdrant_timeout_ms() -> u64 {
	10_000
}
