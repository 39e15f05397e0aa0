use std::collections::HashSet;

use crate::search::ranking::{rank_order, scoring::ScoredCandidate};

#[derive(Clone, Copy)]
struct DiversityPick {
	remaining_pos: usize,
	mmr_score: f32,
	redundancy: f32,
	rank: usize,
}
impl DiversityPick {
	fn better_than(self, other: &Self) -> bool {
		self.mmr_score > other.mmr_score
			|| (self.mmr_score == other.mmr_score && self.rank < other.rank)
	}
}

#[derive(Clone, Debug)]
pub struct Selected {
	pub candidate: ScoredCandidate,
	pub mmr_score: f32,
	/// Highest Jaccard similarity to an earlier selection.
	pub redundancy: f32,
}

/// Slots held for one source document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reservation {
	pub source: String,
	pub count: usize,
}

pub fn jaccard(lhs: &HashSet<String>, rhs: &HashSet<String>) -> f32 {
	if lhs.is_empty() && rhs.is_empty() {
		return 0.0;
	}

	let intersection = lhs.intersection(rhs).count();
	let union = lhs.len() + rhs.len() - intersection;

	intersection as f32 / union as f32
}

/// Picks up to `k` candidates balancing score against lexical redundancy.
pub fn select(
	pool: Vec<ScoredCandidate>,
	k: usize,
	lambda: f32,
	enabled: bool,
	reservation: Option<&Reservation>,
) -> Vec<Selected> {
	let ranked = dedup_ranked(pool);

	if ranked.is_empty() || k == 0 {
		return Vec::new();
	}

	let (mut selected, remaining) = if enabled {
		select_mmr(ranked, k, lambda)
	} else {
		select_top(ranked, k)
	};

	if let Some(reservation) = reservation {
		enforce_reservation(&mut selected, remaining, k, reservation);
	}

	selected
}

/// Swaps the last selection for the best-ranked unselected candidate with a term hit when no
/// selection has one. Returns whether a swap happened.
pub fn ensure_term_hit(selected: &mut [Selected], remaining: &[ScoredCandidate]) -> bool {
	if selected.is_empty() || selected.iter().any(|pick| pick.candidate.has_term_hit()) {
		return false;
	}

	let Some(replacement) = remaining.iter().find(|candidate| candidate.has_term_hit()) else {
		return false;
	};
	let Some(last) = selected.last_mut() else { return false };

	*last = Selected { mmr_score: replacement.score, redundancy: 0.0, candidate: replacement.clone() };

	true
}

/// Sorted pool minus the candidates already selected, in rank order.
pub fn unselected(pool: &[ScoredCandidate], selected: &[Selected]) -> Vec<ScoredCandidate> {
	let taken: HashSet<&str> =
		selected.iter().map(|pick| pick.candidate.chunk().id.as_str()).collect();
	let mut rest: Vec<ScoredCandidate> = pool
		.iter()
		.filter(|candidate| !taken.contains(candidate.chunk().id.as_str()))
		.cloned()
		.collect();

	rest.sort_by(rank_order);

	rest
}

fn dedup_ranked(mut pool: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
	let mut seen = HashSet::new();

	pool.sort_by(rank_order);
	pool.retain(|candidate| seen.insert(candidate.chunk().id.clone()));

	pool
}

fn select_top(mut ranked: Vec<ScoredCandidate>, k: usize) -> (Vec<Selected>, Vec<ScoredCandidate>) {
	let remaining = ranked.split_off(k.min(ranked.len()));
	let selected = ranked
		.into_iter()
		.map(|candidate| Selected { mmr_score: candidate.score, redundancy: 0.0, candidate })
		.collect();

	(selected, remaining)
}

fn select_mmr(
	ranked: Vec<ScoredCandidate>,
	k: usize,
	lambda: f32,
) -> (Vec<Selected>, Vec<ScoredCandidate>) {
	// (rank, candidate, max similarity to the selection so far)
	let mut remaining: Vec<(usize, ScoredCandidate, f32)> =
		ranked.into_iter().enumerate().map(|(rank, candidate)| (rank, candidate, 0.0)).collect();
	let mut selected: Vec<Selected> = Vec::with_capacity(k);

	while selected.len() < k && !remaining.is_empty() {
		let mut best: Option<DiversityPick> = None;

		for (remaining_pos, (rank, candidate, redundancy)) in remaining.iter().enumerate() {
			let pick = DiversityPick {
				remaining_pos,
				mmr_score: lambda * candidate.score - (1.0 - lambda) * redundancy,
				redundancy: *redundancy,
				rank: *rank,
			};

			if best.map(|current| pick.better_than(&current)).unwrap_or(true) {
				best = Some(pick);
			}
		}

		let Some(pick) = best else { break };
		let (_, candidate, _) = remaining.remove(pick.remaining_pos);

		for (_, other, redundancy) in remaining.iter_mut() {
			let similarity = jaccard(&candidate.tokens, &other.tokens);

			if similarity > *redundancy {
				*redundancy = similarity;
			}
		}

		selected.push(Selected { candidate, mmr_score: pick.mmr_score, redundancy: pick.redundancy });
	}

	(selected, remaining.into_iter().map(|(_, candidate, _)| candidate).collect())
}

fn enforce_reservation(
	selected: &mut [Selected],
	mut remaining: Vec<ScoredCandidate>,
	k: usize,
	reservation: &Reservation,
) {
	let have = selected.iter().filter(|pick| pick.candidate.chunk().source == reservation.source).count();
	let available =
		have + remaining.iter().filter(|candidate| candidate.chunk().source == reservation.source).count();
	let target = reservation.count.min(k).min(available).min(selected.len());

	if have >= target {
		return;
	}

	remaining.sort_by(rank_order);

	let replacements: Vec<ScoredCandidate> = remaining
		.into_iter()
		.filter(|candidate| candidate.chunk().source == reservation.source)
		.take(target - have)
		.collect();
	// Lowest non-reserved slots, filled top-down so the replaced tail stays in rank order.
	let mut slots: Vec<usize> = (0..selected.len())
		.rev()
		.filter(|&slot| selected[slot].candidate.chunk().source != reservation.source)
		.take(replacements.len())
		.collect();

	slots.reverse();

	for (slot, candidate) in slots.into_iter().zip(replacements) {
		selected[slot] = Selected { mmr_score: candidate.score, redundancy: 0.0, candidate };
	}
}
