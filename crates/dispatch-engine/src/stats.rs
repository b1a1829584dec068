//! Engine run statistics

use serde::{Deserialize, Serialize};

use crate::employee::Tier;

/// Per-tier assignment counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    /// Calls served by tier 1
    pub frontline: u64,

    /// Calls served by tier 2
    pub supervisor: u64,

    /// Calls served by tier 3
    pub senior: u64,
}

impl TierCounts {
    /// Bump the counter for one tier
    pub fn increment(&mut self, tier: Tier) {
        match tier {
            Tier::Frontline => self.frontline += 1,
            Tier::Supervisor => self.supervisor += 1,
            Tier::Senior => self.senior += 1,
        }
    }

    /// Counter value for one tier
    pub fn for_tier(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Frontline => self.frontline,
            Tier::Supervisor => self.supervisor,
            Tier::Senior => self.senior,
        }
    }

    /// Sum across all tiers
    pub fn total(&self) -> u64 {
        self.frontline + self.supervisor + self.senior
    }
}

/// Monotonic counters for one engine run
///
/// Snapshot-readable through the engine; updated by the dispatcher
/// (submission path) and the worker tasks (completion path).
///
/// # Examples
///
/// ```
/// use callsim_dispatch_engine::EngineStats;
///
/// let stats = EngineStats::default();
/// assert_eq!(stats.calls_submitted, 0);
/// assert_eq!(stats.in_flight(), 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Calls offered to the dispatcher
    pub calls_submitted: u64,

    /// Calls that passed admission (serving or queued at some point)
    pub calls_accepted: u64,

    /// Calls rejected at admission and dropped
    pub calls_dropped: u64,

    /// Calls served to completion (exactly one assignment record each)
    pub calls_served: u64,

    /// Calls admitted but never served: interrupted mid-flight or stranded
    /// in the queue when the engine shut down
    pub calls_abandoned: u64,

    /// Completed assignments broken down by serving tier
    pub assignments_by_tier: TierCounts,
}

impl EngineStats {
    /// Calls admitted and not yet served or abandoned
    pub fn in_flight(&self) -> u64 {
        self.calls_accepted - self.calls_served - self.calls_abandoned
    }
}
