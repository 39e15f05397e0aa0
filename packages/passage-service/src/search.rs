pub mod ranking;

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::{Error, PassageService, Result, index_call};
use passage_config::Candidates;
use passage_storage::models::SearchQuery;
use ranking::{
	diversity::{self, Reservation, Selected},
	expansion::{self, ExpansionDecision, NoExpandReason},
	injection::{self, InjectionDecision},
	query::{self, QueryContext, RankingOverride},
	rank_order,
	scoring::{self, ScoreBreakdown, ScoredCandidate},
	stitching::{self, StitchPolicy, Stitched},
};

/// Caller-side memory of the conversation so far.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SessionContext {
	/// Sources cited in earlier answers. Their chunks get a continuity bonus.
	#[serde(default)]
	pub cited_sources: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchRequest {
	pub query: String,
	#[serde(default)]
	pub limit: Option<u32>,
	#[serde(default)]
	pub overrides: Option<RankingOverride>,
	#[serde(default)]
	pub session: Option<SessionContext>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
	pub chunk_id: String,
	pub source: String,
	pub title: String,
	pub position: i64,
	pub first_position: i64,
	pub last_position: i64,
	pub text: String,
	pub stitched: bool,
	pub score: f32,
	pub mmr_score: f32,
	pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchResponse {
	pub query: String,
	pub collection: String,
	pub count: usize,
	pub hits: Vec<SearchHit>,
	pub trace: RetrievalTrace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
	ReceiveQuery,
	BuildContext,
	Embed,
	InitialFetch,
	ExpandIfWeak,
	Score,
	InjectSource,
	Diversify,
	StitchEach,
	Assemble,
	Respond,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RetrievalTrace {
	pub stages: Vec<PipelineStage>,
	pub initial_limit: u64,
	pub initial_fetched: usize,
	pub pool_initial: usize,
	pub pool_final: usize,
	pub expansion: ExpansionDecision,
	pub expanded_added: usize,
	pub injection: InjectionDecision,
	pub injected_added: usize,
	pub forced_term_hit: bool,
}
impl RetrievalTrace {
	fn new() -> Self {
		Self {
			stages: vec![PipelineStage::ReceiveQuery],
			initial_limit: 0,
			initial_fetched: 0,
			pool_initial: 0,
			pool_final: 0,
			expansion: ExpansionDecision::NoExpand { reason: NoExpandReason::Disabled },
			expanded_added: 0,
			injection: InjectionDecision::NoInject,
			injected_added: 0,
			forced_term_hit: false,
		}
	}

	pub(crate) fn enter(&mut self, stage: PipelineStage) {
		self.stages.push(stage);
	}
}

pub(crate) struct RetrievalPlan<'a> {
	pub query: &'a str,
	pub limit: usize,
	pub candidates: &'a Candidates,
	pub score_threshold: Option<f32>,
	pub overrides: Option<&'a RankingOverride>,
	pub session: Option<&'a SessionContext>,
}

pub(crate) struct Retrieval {
	pub ctx: QueryContext,
	/// Every scored candidate in rank order.
	pub pool: Vec<ScoredCandidate>,
	pub selected: Vec<Selected>,
	pub trace: RetrievalTrace,
}

impl PassageService {
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		let limit =
			resolve_limit(req.limit, self.cfg.search.default_limit, self.cfg.search.max_limit)?;
		let Retrieval { ctx, selected, mut trace, .. } = self
			.retrieve(RetrievalPlan {
				query: &req.query,
				limit,
				candidates: &self.cfg.search.candidates,
				score_threshold: self.cfg.search.score_threshold,
				overrides: req.overrides.as_ref(),
				session: req.session.as_ref(),
			})
			.await?;

		trace.enter(PipelineStage::StitchEach);

		let stitched =
			self.stitch_all(&selected, StitchPolicy::from_config(&self.cfg.search.stitch)).await;
		let hits: Vec<SearchHit> =
			selected.into_iter().zip(stitched).map(|(pick, span)| to_hit(pick, span)).collect();

		trace.enter(PipelineStage::Respond);

		tracing::debug!(query = %ctx.raw, hits = hits.len(), "Search finished.");

		Ok(SearchResponse {
			query: ctx.raw,
			collection: self.index.collection().to_string(),
			count: hits.len(),
			hits,
			trace,
		})
	}

	/// Runs the shared core: context, embedding, fetch, expansion, scoring, injection, selection.
	pub(crate) async fn retrieve(&self, plan: RetrievalPlan<'_>) -> Result<Retrieval> {
		let mut trace = RetrievalTrace::new();
		let cited: &[String] = plan.session.map(|session| session.cited_sources.as_slice()).unwrap_or(&[]);
		let ctx = query::build_query_context(
			&self.cfg,
			&self.tokenizer,
			plan.query,
			plan.overrides,
			cited,
		)?;

		trace.enter(PipelineStage::BuildContext);

		let vector = self.embedding.embed_query(&ctx.raw).await?;

		trace.enter(PipelineStage::Embed);

		let timeout = self.index_timeout();
		let distance = self.index.distance();
		let initial_limit = fetch_limit(plan.limit, plan.candidates);
		let initial = SearchQuery {
			vector,
			limit: initial_limit,
			score_threshold: plan.score_threshold,
			source: None,
		};
		let candidates = index_call(timeout, self.index.search(&initial)).await?;

		trace.enter(PipelineStage::InitialFetch);
		trace.initial_limit = initial_limit;
		trace.initial_fetched = candidates.len();

		let fetched = candidates.len();
		let mut pool = scoring::score_pool(&ctx, candidates, distance, &self.tokenizer);

		trace.pool_initial = pool.len();

		let decision =
			expansion::decide_expansion(&pool, fetched, initial_limit, &self.cfg.expansion);

		if let ExpansionDecision::Expand { limit, score_threshold } = &decision {
			trace.enter(PipelineStage::ExpandIfWeak);

			let expanded = SearchQuery {
				vector: initial.vector.clone(),
				limit: *limit,
				score_threshold: score_threshold.or(plan.score_threshold),
				source: None,
			};

			match index_call(timeout, self.index.search(&expanded)).await {
				Ok(more) => {
					let scored = scoring::score_pool(&ctx, more, distance, &self.tokenizer);

					trace.expanded_added = expansion::merge_new(&mut pool, scored);
				},
				Err(err) => {
					tracing::warn!(error = %err, limit, "Expansion fetch failed. Keeping the initial pool.");
				},
			}
		}

		trace.expansion = decision;
		trace.enter(PipelineStage::Score);

		let mut injection = injection::detect_source(&ctx, &pool, &self.cfg.injection);
		let mut reservation = None;

		if let InjectionDecision::Inject { target } = &mut injection {
			trace.enter(PipelineStage::InjectSource);

			let floor = self.cfg.injection.floor as usize;

			if injection::count_from_source(&pool, &target.source_id) < floor {
				let sources: Vec<String> = std::iter::once(target.source_id.clone())
					.chain(target.alternatives.iter().cloned())
					.collect();

				// First source with chunks in the index wins.
				for source in sources {
					let by_source = SearchQuery {
						vector: initial.vector.clone(),
						limit: u64::from(self.cfg.injection.fetch_limit),
						score_threshold: None,
						source: Some(source.clone()),
					};

					match index_call(timeout, self.index.search(&by_source)).await {
						Ok(found) if found.is_empty() => continue,
						Ok(found) => {
							let scored = scoring::score_pool(&ctx, found, distance, &self.tokenizer);

							trace.injected_added = expansion::merge_new(&mut pool, scored);
							target.source_id = source;

							break;
						},
						Err(err) => {
							tracing::warn!(error = %err, source = source.as_str(), "Source injection fetch failed.");

							break;
						},
					}
				}
			}

			if injection::apply_bonus(&mut pool, &target.source_id, self.cfg.injection.bonus) > 0 {
				reservation = Some(Reservation { source: target.source_id.clone(), count: floor });
			}
		}

		trace.injection = injection;

		pool.sort_by(rank_order);

		trace.pool_final = pool.len();
		trace.enter(PipelineStage::Diversify);

		let selected = diversity::select(
			pool.clone(),
			plan.limit,
			ctx.ranking.mmr_lambda,
			self.cfg.diversity.enabled,
			reservation.as_ref(),
		);

		Ok(Retrieval { ctx, pool, selected, trace })
	}

	/// Stitches every selection concurrently, keeping selection order.
	pub(crate) async fn stitch_all(&self, selected: &[Selected], policy: StitchPolicy) -> Vec<Stitched> {
		let timeout = self.index_timeout();
		let mut tasks = JoinSet::new();

		for (slot, pick) in selected.iter().enumerate() {
			let index = Arc::clone(&self.index);
			let chunk = pick.candidate.chunk().clone();

			tasks.spawn(async move {
				let stitched = stitching::stitch(index.as_ref(), &chunk, &policy, timeout).await;

				(slot, stitched)
			});
		}

		let mut spans: Vec<Option<Stitched>> = vec![None; selected.len()];

		while let Some(joined) = tasks.join_next().await {
			match joined {
				Ok((slot, stitched)) => spans[slot] = Some(stitched),
				Err(err) => tracing::warn!(error = %err, "Stitch task failed."),
			}
		}

		spans
			.into_iter()
			.zip(selected)
			.map(|(span, pick)| span.unwrap_or_else(|| Stitched::unstitched(pick.candidate.chunk())))
			.collect()
	}
}

/// Applies the default and the ceiling to a requested result count.
pub(crate) fn resolve_limit(requested: Option<u32>, default: u32, max: u32) -> Result<usize> {
	match requested {
		Some(0) => Err(Error::InvalidRequest { message: "limit must be greater than zero.".to_string() }),
		Some(limit) => Ok(limit.min(max) as usize),
		None => Ok(default.min(max) as usize),
	}
}

/// First-fetch size: `limit * multiplier`, kept within the configured bounds.
pub(crate) fn fetch_limit(limit: usize, candidates: &Candidates) -> u64 {
	let wanted = (limit as u64).saturating_mul(u64::from(candidates.multiplier));

	wanted.clamp(u64::from(candidates.min), u64::from(candidates.max))
}

fn to_hit(pick: Selected, span: Stitched) -> SearchHit {
	let Selected { candidate, mmr_score, .. } = pick;
	let chunk = candidate.candidate.chunk;

	SearchHit {
		chunk_id: chunk.id,
		source: chunk.source,
		title: chunk.title,
		position: chunk.position,
		first_position: span.first_position,
		last_position: span.last_position,
		text: span.text,
		stitched: span.neighbors > 0,
		score: candidate.score,
		mmr_score,
		breakdown: candidate.breakdown,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn zero_limit_is_rejected() {
		assert!(matches!(resolve_limit(Some(0), 5, 50), Err(Error::InvalidRequest { .. })));
	}

	#[test]
	fn limit_defaults_and_clamps() {
		assert_eq!(resolve_limit(None, 5, 50).ok(), Some(5));
		assert_eq!(resolve_limit(Some(500), 5, 50).ok(), Some(50));
	}

	#[test]
	fn fetch_limit_stays_in_bounds() {
		let candidates = Candidates { multiplier: 10, min: 50, max: 200 };

		assert_eq!(fetch_limit(1, &candidates), 50);
		assert_eq!(fetch_limit(10, &candidates), 100);
		assert_eq!(fetch_limit(50, &candidates), 200);
	}
}
