//! Engine configuration
//!
//! All knobs for a simulation run live here: dispatcher sizing, escalation
//! backoff, tier rosters, and the random call duration range. Defaults
//! reproduce the classic exercise setup (10 workers, 3 queue slots, a 5/3/2
//! roster, 500 ms backoff, 3 s rejection cooldown).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::employee::Tier;

/// Complete dispatch engine configuration
///
/// # Configuration Sections
///
/// - [`dispatcher`](EngineConfig::dispatcher): worker pool size, admission queue capacity, rejection cooldown
/// - [`escalation`](EngineConfig::escalation): backoff before the chain restarts from tier 1
/// - [`roster`](EngineConfig::roster): employee counts per tier
/// - [`calls`](EngineConfig::calls): random service duration range
///
/// # Examples
///
/// ```
/// use callsim_dispatch_engine::prelude::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert_eq!(config.dispatcher.worker_count, 10);
/// assert_eq!(config.roster.frontline, 5);
/// assert_eq!(config.admission_capacity(), 13);
/// ```
///
/// ```
/// use callsim_dispatch_engine::prelude::EngineConfig;
///
/// let mut config = EngineConfig::default();
/// config.dispatcher.worker_count = 4;
/// config.roster.frontline = 2;
/// config.roster.supervisor = 1;
/// config.roster.senior = 1;
/// config.validate().expect("configuration should be valid");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Dispatcher settings: worker pool and admission path
    pub dispatcher: DispatcherConfig,

    /// Escalation chain settings
    pub escalation: EscalationConfig,

    /// Employee counts per tier
    pub roster: RosterConfig,

    /// Random call duration range
    pub calls: CallDurationConfig,
}

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Number of worker tasks executing escalation chains concurrently
    pub worker_count: usize,

    /// Admission queue slots beyond the busy workers
    ///
    /// Together with `worker_count` this bounds the calls in flight: a
    /// submission is rejected once `worker_count + admission_queue_capacity`
    /// calls are being served or waiting.
    pub admission_queue_capacity: usize,

    /// Pause applied to the whole input sequence after a rejected submission,
    /// in milliseconds
    pub rejection_cooldown_ms: u64,
}

/// Escalation chain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// How long a fully-escalated call waits before the chain restarts from
    /// tier 1, in milliseconds
    pub backoff_interval_ms: u64,
}

/// Employee roster configuration
///
/// One fixed head-count per tier, created at engine start-up. A tier may be
/// empty (its handler then always escalates), but the roster as a whole must
/// contain at least one employee.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Front-line employees (tier 1)
    pub frontline: usize,

    /// Supervisors (tier 2)
    pub supervisor: usize,

    /// Senior staff (tier 3)
    pub senior: usize,
}

impl RosterConfig {
    /// Head-count for one tier
    pub fn count_for(&self, tier: Tier) -> usize {
        match tier {
            Tier::Frontline => self.frontline,
            Tier::Supervisor => self.supervisor,
            Tier::Senior => self.senior,
        }
    }

    /// Total employees across all tiers
    pub fn total(&self) -> usize {
        self.frontline + self.supervisor + self.senior
    }
}

/// Random call duration configuration
///
/// Durations are drawn uniformly from `[min, min + spread]` milliseconds,
/// both ends inclusive. Fixed duration lists bypass this section entirely
/// (see `FixedCallSource`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallDurationConfig {
    /// Shortest possible service duration in milliseconds
    pub min_duration_ms: u64,

    /// Width of the random range above the minimum, in milliseconds
    pub max_duration_spread_ms: u64,
}

impl CallDurationConfig {
    /// Longest possible service duration in milliseconds
    pub fn max_duration_ms(&self) -> u64 {
        self.min_duration_ms + self.max_duration_spread_ms
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dispatcher: DispatcherConfig::default(),
            escalation: EscalationConfig::default(),
            roster: RosterConfig::default(),
            calls: CallDurationConfig::default(),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_count: 10,
            admission_queue_capacity: 3,
            rejection_cooldown_ms: 3000,
        }
    }
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            backoff_interval_ms: 500,
        }
    }
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            frontline: 5,
            supervisor: 3,
            senior: 2,
        }
    }
}

impl Default for CallDurationConfig {
    fn default() -> Self {
        Self {
            min_duration_ms: 5000,
            max_duration_spread_ms: 5000,
        }
    }
}

impl EngineConfig {
    /// Total in-flight capacity of the admission path
    ///
    /// Serving plus queued calls; one more than this is a rejection.
    pub fn admission_capacity(&self) -> usize {
        self.dispatcher.worker_count + self.dispatcher.admission_queue_capacity
    }

    /// Rejection cooldown as a [`Duration`]
    pub fn rejection_cooldown(&self) -> Duration {
        Duration::from_millis(self.dispatcher.rejection_cooldown_ms)
    }

    /// Backoff interval as a [`Duration`]
    pub fn backoff_interval(&self) -> Duration {
        Duration::from_millis(self.escalation.backoff_interval_ms)
    }

    /// Validate the configuration
    ///
    /// Returns a description of the first problem found. Called by the
    /// engine before anything is built, so a bad configuration never spawns
    /// a task.
    pub fn validate(&self) -> Result<(), String> {
        if self.dispatcher.worker_count == 0 {
            return Err("worker_count must be greater than 0".to_string());
        }

        if self.dispatcher.admission_queue_capacity == 0 {
            return Err("admission_queue_capacity must be greater than 0".to_string());
        }

        if self.dispatcher.rejection_cooldown_ms == 0 {
            return Err("rejection_cooldown_ms must be greater than 0".to_string());
        }

        if self.escalation.backoff_interval_ms == 0 {
            return Err("backoff_interval_ms must be greater than 0 (a zero backoff would spin the chain)".to_string());
        }

        if self.roster.total() == 0 {
            return Err("roster must contain at least one employee across the tiers".to_string());
        }

        if self.calls.min_duration_ms == 0 {
            return Err("min_duration_ms must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.admission_capacity(), 13);
        assert_eq!(config.roster.total(), 10);
        assert_eq!(config.calls.max_duration_ms(), 10000);
    }

    #[test]
    fn test_zero_workers_are_rejected() {
        let mut config = EngineConfig::default();
        config.dispatcher.worker_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_an_entirely_empty_roster_is_rejected() {
        let mut config = EngineConfig::default();
        config.roster = RosterConfig {
            frontline: 0,
            supervisor: 0,
            senior: 0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_a_single_empty_tier_is_allowed() {
        let mut config = EngineConfig::default();
        config.roster.supervisor = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_durations_and_intervals_are_rejected() {
        let mut config = EngineConfig::default();
        config.calls.min_duration_ms = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.escalation.backoff_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.dispatcher.rejection_cooldown_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_roster_counts_map_to_tiers() {
        let roster = RosterConfig {
            frontline: 4,
            supervisor: 3,
            senior: 3,
        };
        assert_eq!(roster.count_for(Tier::Frontline), 4);
        assert_eq!(roster.count_for(Tier::Supervisor), 3);
        assert_eq!(roster.count_for(Tier::Senior), 3);
        assert_eq!(roster.total(), 10);
    }
}
