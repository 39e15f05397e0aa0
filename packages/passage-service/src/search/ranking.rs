pub mod diversity;
pub mod expansion;
pub mod injection;
pub mod query;
pub mod scoring;
pub mod stitching;

use std::cmp::Ordering;

use scoring::ScoredCandidate;

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

/// Pool order: score descending, then document order (source, position), then chunk id.
pub fn rank_order(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
	let ord = cmp_f32_desc(a.score, b.score);

	if ord != Ordering::Equal {
		return ord;
	}

	let (lhs, rhs) = (a.chunk(), b.chunk());

	lhs.source
		.cmp(&rhs.source)
		.then_with(|| lhs.position.cmp(&rhs.position))
		.then_with(|| lhs.id.cmp(&rhs.id))
}
