use std::time::Duration;

use tokio::time::Instant;

use grounding_config::{Budget, StageBudget};
use grounding_domain::SourceFailureReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
	Run { timeout_ms: u64 },
	Skip,
}

/// Slices one stage's timeout out of the remaining budget.
///
/// The stage is skipped when less than `floor_ms` remains. Otherwise it gets whatever is left
/// after holding back `reserve_ms` for later stages, never less than its floor and never more
/// than its cap or the remaining time.
pub fn allocate(remaining_ms: u64, cap_ms: u64, reserve_ms: u64, floor_ms: u64) -> Allocation {
	if remaining_ms < floor_ms {
		return Allocation::Skip;
	}

	let timeout_ms =
		remaining_ms.saturating_sub(reserve_ms).max(floor_ms).min(cap_ms).min(remaining_ms);

	Allocation::Run { timeout_ms }
}

/// Candidate-source stages after the hint seed, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
	ScopedCatalog,
	ScopedSearch,
	GlobalCatalog,
	GlobalSearch,
}
impl Stage {
	pub const ALL: [Self; 4] =
		[Self::ScopedCatalog, Self::ScopedSearch, Self::GlobalCatalog, Self::GlobalSearch];

	pub fn source_name(self) -> &'static str {
		match self {
			Self::ScopedCatalog => "products_cache",
			Self::ScopedSearch => "agent_search_scoped",
			Self::GlobalCatalog => "products_cache_global",
			Self::GlobalSearch => "agent_search_global",
		}
	}

	pub fn is_scoped(self) -> bool {
		matches!(self, Self::ScopedCatalog | Self::ScopedSearch)
	}

	pub fn is_catalog(self) -> bool {
		matches!(self, Self::ScopedCatalog | Self::GlobalCatalog)
	}

	pub fn budget(self, budget: &Budget) -> StageBudget {
		match self {
			Self::ScopedCatalog => budget.scoped_catalog,
			Self::ScopedSearch => budget.scoped_search,
			Self::GlobalCatalog => budget.global_catalog,
			Self::GlobalSearch => budget.global_search,
		}
	}

	pub fn timeout_reason(self) -> SourceFailureReason {
		if self.is_catalog() {
			SourceFailureReason::DbTimeout
		} else {
			SourceFailureReason::UpstreamTimeout
		}
	}

	/// Whether the stage can run at all for this request, before looking at results.
	pub fn statically_eligible(self, has_scope: bool, search_all: bool) -> bool {
		if self.is_scoped() { has_scope } else { search_all }
	}

	/// Sum of the caps of every later stage that could still run.
	pub fn reserve_ms(self, budget: &Budget, has_scope: bool, search_all: bool) -> u64 {
		Self::ALL
			.iter()
			.skip_while(|stage| **stage != self)
			.skip(1)
			.filter(|stage| stage.statically_eligible(has_scope, search_all))
			.map(|stage| stage.budget(budget).cap_ms)
			.sum()
	}
}

/// Monotonic resolution deadline, fixed once when resolution starts.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
	started: Instant,
	deadline: Instant,
}
impl Deadline {
	pub fn after(timeout_ms: u64) -> Self {
		let started = Instant::now();

		Self { started, deadline: started + Duration::from_millis(timeout_ms) }
	}

	pub fn remaining_ms(&self) -> u64 {
		millis(self.deadline.saturating_duration_since(Instant::now()))
	}

	pub fn elapsed_ms(&self) -> u64 {
		millis(self.started.elapsed())
	}
}

fn millis(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn budget() -> Budget {
		Budget::default()
	}

	#[test]
	fn skips_below_floor() {
		assert_eq!(allocate(49, 300, 0, 50), Allocation::Skip);
		assert_eq!(allocate(0, 300, 0, 50), Allocation::Skip);
	}

	#[test]
	fn holds_back_reserve_but_not_below_floor() {
		assert_eq!(allocate(800, 300, 400, 50), Allocation::Run { timeout_ms: 300 });
		assert_eq!(allocate(600, 300, 400, 50), Allocation::Run { timeout_ms: 200 });
		assert_eq!(allocate(420, 300, 400, 50), Allocation::Run { timeout_ms: 50 });
	}

	#[test]
	fn last_stage_takes_the_remainder_up_to_cap() {
		assert_eq!(allocate(700, 1_200, 0, 120), Allocation::Run { timeout_ms: 700 });
		assert_eq!(allocate(5_000, 1_200, 0, 120), Allocation::Run { timeout_ms: 1_200 });
	}

	#[test]
	fn allocation_never_exceeds_remaining() {
		for remaining in [50_u64, 51, 99, 120, 800, 15_000] {
			for reserve in [0_u64, 60, 1_900] {
				if let Allocation::Run { timeout_ms } = allocate(remaining, 300, reserve, 50) {
					assert!(timeout_ms <= remaining);
					assert!(timeout_ms >= 50);
				}
			}
		}
	}

	#[test]
	fn reserve_counts_only_eligible_later_stages() {
		let budget = budget();

		assert_eq!(Stage::ScopedCatalog.reserve_ms(&budget, true, false), 400);
		assert_eq!(Stage::ScopedCatalog.reserve_ms(&budget, true, true), 400 + 300 + 1_200);
		assert_eq!(Stage::ScopedSearch.reserve_ms(&budget, true, true), 300 + 1_200);
		assert_eq!(Stage::GlobalCatalog.reserve_ms(&budget, false, true), 1_200);
		assert_eq!(Stage::GlobalSearch.reserve_ms(&budget, true, true), 0);
	}

	#[test]
	fn sequential_stages_conserve_the_budget() {
		let budget = budget();

		for total in [100_u64, 250, 800, 2_000, 15_000] {
			let mut remaining = total;
			let mut used = 0;

			for stage in Stage::ALL {
				let stage_budget = stage.budget(&budget);
				let reserve = stage.reserve_ms(&budget, true, true);

				// Worst case: every stage burns its whole allotment.
				if let Allocation::Run { timeout_ms } =
					allocate(remaining, stage_budget.cap_ms, reserve, stage_budget.floor_ms)
				{
					used += timeout_ms;
					remaining -= timeout_ms;
				}
			}

			assert!(used <= total, "used {used} of {total}");
		}
	}

	#[tokio::test(start_paused = true)]
	async fn deadline_tracks_paused_clock() {
		let deadline = Deadline::after(800);

		tokio::time::advance(Duration::from_millis(300)).await;

		assert_eq!(deadline.remaining_ms(), 500);
		assert_eq!(deadline.elapsed_ms(), 300);

		tokio::time::advance(Duration::from_millis(900)).await;

		assert_eq!(deadline.remaining_ms(), 0);
	}
}
