use std::{collections::BTreeMap, time::Duration};

use passage_storage::{ChunkIndex, models::Chunk};

pub const SEPARATOR: &str = "\n\n";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StitchPolicy {
	pub enabled: bool,
	/// Chunks at least this long are returned as is.
	pub stitch_after_chars: usize,
	pub max_chars: usize,
	pub before: i64,
	pub after: i64,
}
impl StitchPolicy {
	pub fn from_config(cfg: &passage_config::Stitch) -> Self {
		Self {
			enabled: cfg.enabled,
			stitch_after_chars: cfg.stitch_after_chars as usize,
			max_chars: cfg.max_chars as usize,
			before: i64::from(cfg.before),
			after: i64::from(cfg.after),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stitched {
	pub text: String,
	pub first_position: i64,
	pub last_position: i64,
	/// Number of neighbor chunks joined to the base chunk.
	pub neighbors: usize,
}
impl Stitched {
	pub fn unstitched(chunk: &Chunk) -> Self {
		Self {
			text: chunk.text.clone(),
			first_position: chunk.position,
			last_position: chunk.position,
			neighbors: 0,
		}
	}
}

/// Expands `chunk` with adjacent chunks of the same source when it is short.
///
/// Neighbor fetch failures are logged and the base text is returned.
pub async fn stitch(
	index: &dyn ChunkIndex,
	chunk: &Chunk,
	policy: &StitchPolicy,
	timeout: Duration,
) -> Stitched {
	if !policy.enabled
		|| chunk.text.chars().count() >= policy.stitch_after_chars
		|| (policy.before == 0 && policy.after == 0)
	{
		return Stitched::unstitched(chunk);
	}

	let first = chunk.position.saturating_sub(policy.before);
	let last = chunk.position.saturating_add(policy.after);
	let neighbors =
		match crate::index_call(timeout, index.neighbors(&chunk.source, first, last)).await {
			Ok(neighbors) => neighbors,
			Err(err) => {
				tracing::warn!(
					error = %err,
					chunk_id = %chunk.id,
					source = %chunk.source,
					"Neighbor fetch failed. Returning the unstitched chunk."
				);

				return Stitched::unstitched(chunk);
			},
		};

	plan_neighbors(chunk, &neighbors, policy.max_chars)
}

/// Grows the span around `base` one neighbor at a time, nearest first and the following chunk
/// before the preceding one. Stops at the first neighbor that would push the text over
/// `max_chars`, so only whole chunks are joined and the span stays contiguous.
pub fn plan_neighbors(base: &Chunk, neighbors: &[Chunk], max_chars: usize) -> Stitched {
	let by_position: BTreeMap<i64, &Chunk> = neighbors
		.iter()
		.filter(|neighbor| neighbor.source == base.source && neighbor.position != base.position)
		.map(|neighbor| (neighbor.position, neighbor))
		.collect();
	let separator_chars = SEPARATOR.chars().count();
	let mut used = base.text.chars().count();
	let mut first = base.position;
	let mut last = base.position;
	let mut after_open = true;
	let mut before_open = true;

	'grow: while after_open || before_open {
		for forward in [true, false] {
			let (open, position) = if forward {
				(&mut after_open, last.checked_add(1))
			} else {
				(&mut before_open, first.checked_sub(1))
			};

			if !*open {
				continue;
			}

			let Some(neighbor) = position.and_then(|position| by_position.get(&position)) else {
				*open = false;

				continue;
			};
			let cost = separator_chars + neighbor.text.chars().count();

			if used + cost > max_chars {
				break 'grow;
			}

			used += cost;

			if forward {
				last = neighbor.position;
			} else {
				first = neighbor.position;
			}
		}
	}

	if first == last {
		return Stitched::unstitched(base);
	}

	let parts: Vec<&str> = (first..=last)
		.filter_map(|position| {
			if position == base.position {
				Some(base.text.as_str())
			} else {
				by_position.get(&position).map(|chunk| chunk.text.as_str())
			}
		})
		.collect();

	Stitched {
		text: parts.join(SEPARATOR),
		first_position: first,
		last_position: last,
		neighbors: parts.len() - 1,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn chunk(position: i64, chars: usize) -> Chunk {
		Chunk {
			id: format!("s#{position}"),
			source: "s.tex".to_string(),
			title: "s".to_string(),
			position,
			text: "x".repeat(chars),
		}
	}

	#[test]
	fn whole_neighbors_only_within_budget() {
		let base = chunk(5, 40);
		let stitched = plan_neighbors(&base, &[chunk(4, 100), chunk(5, 40), chunk(6, 100)], 150);

		assert_eq!(stitched.neighbors, 1);
		assert_eq!((stitched.first_position, stitched.last_position), (5, 6));
		assert_eq!(stitched.text.chars().count(), 142);
	}

	#[test]
	fn following_neighbor_comes_first_at_equal_distance() {
		let base = chunk(5, 10);
		let stitched = plan_neighbors(&base, &[chunk(4, 10), chunk(6, 10), chunk(7, 10)], 36);

		assert_eq!((stitched.first_position, stitched.last_position), (4, 6));
	}

	#[test]
	fn gaps_close_a_side() {
		let base = chunk(5, 10);
		let stitched = plan_neighbors(&base, &[chunk(7, 10), chunk(4, 10)], 1000);

		assert_eq!((stitched.first_position, stitched.last_position), (4, 5));
	}

	#[test]
	fn stitched_text_never_exceeds_budget() {
		let base = chunk(5, 30);
		let neighbors: Vec<Chunk> = (0..10).map(|position| chunk(position, 25)).collect();

		for budget in [30, 50, 57, 84, 200] {
			let stitched = plan_neighbors(&base, &neighbors, budget);

			assert!(stitched.text.chars().count() <= budget);
		}
	}

	#[test]
	fn no_neighbors_returns_base() {
		let base = chunk(0, 10);

		assert_eq!(plan_neighbors(&base, &[], 100), Stitched::unstitched(&base));
	}
}
