use crate::{
	Error, PassageService, Result,
	search::{
		PipelineStage, RetrievalPlan, RetrievalTrace, SessionContext, resolve_limit,
		ranking::{
			diversity::{self, Selected},
			query::RankingOverride,
			rank_order,
			stitching::{SEPARATOR, StitchPolicy, Stitched},
		},
	},
};
use passage_domain::sanitize;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RagRequest {
	pub query: String,
	#[serde(default)]
	pub limit: Option<u32>,
	/// Character budget for the assembled context.
	#[serde(default)]
	pub context_chars: Option<u32>,
	#[serde(default)]
	pub overrides: Option<RankingOverride>,
	#[serde(default)]
	pub session: Option<SessionContext>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RagCitation {
	pub rank: usize,
	pub chunk_id: String,
	pub source: String,
	pub title: String,
	pub first_position: i64,
	pub last_position: i64,
	pub score: f32,
	/// Byte offset of the segment inside the context.
	pub start: usize,
	/// Exclusive byte offset.
	pub end: usize,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RagSegment {
	pub text: String,
	pub citation: RagCitation,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RagContext {
	pub context: String,
	pub segments: Vec<RagSegment>,
	pub budget_chars: usize,
	pub used_chars: usize,
	/// Segments left out because they did not fit.
	pub dropped: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RagResponse {
	pub query: String,
	pub collection: String,
	pub context: RagContext,
	/// Distinct sources of the included segments, in context order.
	pub sources: Vec<String>,
	pub trace: RetrievalTrace,
}

/// One stitched selection waiting for a place in the context.
#[derive(Debug, Clone)]
pub(crate) struct SegmentInput {
	pub chunk_id: String,
	pub source: String,
	pub title: String,
	pub first_position: i64,
	pub last_position: i64,
	pub score: f32,
	pub text: String,
}

impl PassageService {
	pub async fn rag(&self, req: RagRequest) -> Result<RagResponse> {
		let rag = &self.cfg.rag;
		let limit = resolve_limit(req.limit, rag.default_limit, rag.max_limit)?;
		let budget = resolve_budget(req.context_chars, rag.context_chars, rag.max_context_chars)?;
		let retrieval = self
			.retrieve(RetrievalPlan {
				query: &req.query,
				limit,
				candidates: &rag.candidates,
				score_threshold: None,
				overrides: req.overrides.as_ref(),
				session: req.session.as_ref(),
			})
			.await?;
		let ctx = retrieval.ctx;
		let mut selected = retrieval.selected;
		let mut trace = retrieval.trace;

		if rag.require_term_hit {
			let rest = diversity::unselected(&retrieval.pool, &selected);

			trace.forced_term_hit = diversity::ensure_term_hit(&mut selected, &rest);
		}

		trace.enter(PipelineStage::StitchEach);

		let stitched = self.stitch_all(&selected, StitchPolicy::from_config(&rag.stitch)).await;
		let mut pairs: Vec<(Selected, Stitched)> = selected.into_iter().zip(stitched).collect();

		pairs.sort_by(|(a, _), (b, _)| rank_order(&a.candidate, &b.candidate));
		trace.enter(PipelineStage::Assemble);

		let inputs = pairs.into_iter().map(|(pick, span)| to_input(pick, span)).collect();
		let context = assemble_context(inputs, budget);
		let mut sources: Vec<String> = Vec::new();

		for segment in &context.segments {
			if !sources.contains(&segment.citation.source) {
				sources.push(segment.citation.source.clone());
			}
		}

		trace.enter(PipelineStage::Respond);

		tracing::debug!(
			query = %ctx.raw,
			segments = context.segments.len(),
			used_chars = context.used_chars,
			dropped = context.dropped,
			"RAG context assembled."
		);

		Ok(RagResponse {
			query: ctx.raw,
			collection: self.index.collection().to_string(),
			context,
			sources,
			trace,
		})
	}
}

fn resolve_budget(requested: Option<u32>, default: u32, max: u32) -> Result<usize> {
	match requested {
		Some(0) => Err(Error::InvalidRequest {
			message: "context_chars must be greater than zero.".to_string(),
		}),
		Some(chars) => Ok(chars.min(max) as usize),
		None => Ok(default.min(max) as usize),
	}
}

fn to_input(pick: Selected, span: Stitched) -> SegmentInput {
	let score = pick.candidate.score;
	let chunk = pick.candidate.candidate.chunk;

	SegmentInput {
		chunk_id: chunk.id,
		source: chunk.source,
		title: chunk.title,
		first_position: span.first_position,
		last_position: span.last_position,
		score,
		text: span.text,
	}
}

/// Joins segments in the given order while the context stays within `budget` characters.
///
/// A segment that does not fit is left out whole and later, shorter segments may still be
/// placed. Ranks are assigned to the placed segments only.
pub(crate) fn assemble_context(inputs: Vec<SegmentInput>, budget: usize) -> RagContext {
	let separator_chars = SEPARATOR.chars().count();
	let mut context = String::new();
	let mut used = 0;
	let mut segments = Vec::new();
	let mut dropped = 0;

	for input in inputs {
		let body = sanitize::sanitize_context(&input.text);

		if body.is_empty() {
			dropped += 1;

			continue;
		}

		let rank = segments.len() + 1;
		let text = format!("{}\n{body}", header(rank, &input));
		let chars = text.chars().count();
		let cost = if segments.is_empty() { chars } else { chars + separator_chars };

		if used + cost > budget {
			dropped += 1;

			continue;
		}
		if !segments.is_empty() {
			context.push_str(SEPARATOR);
		}

		let start = context.len();

		context.push_str(&text);
		used += cost;
		segments.push(RagSegment {
			citation: RagCitation {
				rank,
				chunk_id: input.chunk_id,
				source: input.source,
				title: input.title,
				first_position: input.first_position,
				last_position: input.last_position,
				score: input.score,
				start,
				end: context.len(),
			},
			text,
		});
	}

	RagContext { context, segments, budget_chars: budget, used_chars: used, dropped }
}

fn header(rank: usize, input: &SegmentInput) -> String {
	let title = if input.title.is_empty() { input.source.as_str() } else { input.title.as_str() };

	if input.first_position == input.last_position {
		format!("[{rank}] {title} ({}, chunk {})", input.source, input.first_position)
	} else {
		format!(
			"[{rank}] {title} ({}, chunks {}-{})",
			input.source, input.first_position, input.last_position
		)
	}
}
