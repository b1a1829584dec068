//! Call value type and call sources
//!
//! A [`Call`] is one immutable unit of work with a simulated service
//! duration. Calls reach the engine as a finite ordered sequence produced by
//! a [`CallSource`]: either a fixed duration list (deterministic tests) or
//! uniformly random durations (simulation runs).

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Call identifier type for strongly-typed call references
///
/// Ids are assigned by the call source as a monotonically increasing
/// sequence starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(pub u64);

impl From<u64> for CallId {
    fn from(n: u64) -> Self {
        CallId(n)
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One incoming call
///
/// Immutable after construction. The service duration is how long a worker
/// sleeps to simulate serving the call; it is fixed at creation, whether
/// injected or drawn at random.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    id: CallId,
    service_duration_ms: u64,
}

impl Call {
    /// Create a new call
    ///
    /// # Panics
    ///
    /// Panics if `service_duration_ms` is zero. A zero service time is a
    /// broken precondition, not a recoverable runtime condition.
    pub fn new(id: impl Into<CallId>, service_duration_ms: u64) -> Self {
        let id = id.into();
        assert!(
            service_duration_ms > 0,
            "call {} constructed with zero service duration",
            id
        );
        Self {
            id,
            service_duration_ms,
        }
    }

    /// The call's identifier
    pub fn id(&self) -> CallId {
        self.id
    }

    /// Simulated service time in milliseconds
    pub fn service_duration_ms(&self) -> u64 {
        self.service_duration_ms
    }

    /// Simulated service time as a [`Duration`]
    pub fn service_duration(&self) -> Duration {
        Duration::from_millis(self.service_duration_ms)
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call {} ({}ms)", self.id, self.service_duration_ms)
    }
}

/// A finite ordered sequence of incoming calls
///
/// The engine only ever pulls: `next_call` yields the next call or `None` at
/// end of sequence.
pub trait CallSource: Send {
    /// Produce the next call, or `None` when the sequence is exhausted
    fn next_call(&mut self) -> Option<Call>;
}

impl<S: CallSource + ?Sized> CallSource for Box<S> {
    fn next_call(&mut self) -> Option<Call> {
        (**self).next_call()
    }
}

/// Call source backed by an explicit list of service durations
///
/// Ids are assigned 1..n in list order. This is the deterministic source
/// used by tests.
///
/// # Examples
///
/// ```
/// use callsim_dispatch_engine::{CallSource, FixedCallSource};
///
/// let mut source = FixedCallSource::new([250, 500]);
/// let first = source.next_call().unwrap();
/// assert_eq!(first.id().0, 1);
/// assert_eq!(first.service_duration_ms(), 250);
/// assert_eq!(source.next_call().unwrap().id().0, 2);
/// assert!(source.next_call().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct FixedCallSource {
    calls: VecDeque<Call>,
}

impl FixedCallSource {
    /// Build a source from service durations in milliseconds
    pub fn new(durations_ms: impl IntoIterator<Item = u64>) -> Self {
        let calls = durations_ms
            .into_iter()
            .enumerate()
            .map(|(i, ms)| Call::new(i as u64 + 1, ms))
            .collect();
        Self { calls }
    }

    /// Number of calls left in the sequence
    pub fn remaining(&self) -> usize {
        self.calls.len()
    }
}

impl CallSource for FixedCallSource {
    fn next_call(&mut self) -> Option<Call> {
        self.calls.pop_front()
    }
}

/// Call source drawing service durations uniformly at random
///
/// Durations fall in `[min, min + spread]` milliseconds, both ends
/// inclusive. A seeded source reproduces the same duration sequence run
/// after run, which keeps "random" simulations replayable.
#[derive(Debug)]
pub struct RandomCallSource {
    remaining: usize,
    next_id: u64,
    min_ms: u64,
    spread_ms: u64,
    rng: SmallRng,
}

impl RandomCallSource {
    /// Build a source of `count` calls with durations in `[min, min + spread]` ms
    pub fn new(count: usize, min_ms: u64, spread_ms: u64) -> Self {
        Self::with_rng(count, min_ms, spread_ms, SmallRng::from_entropy())
    }

    /// Build a seeded source for reproducible runs
    pub fn with_seed(count: usize, min_ms: u64, spread_ms: u64, seed: u64) -> Self {
        Self::with_rng(count, min_ms, spread_ms, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(count: usize, min_ms: u64, spread_ms: u64, rng: SmallRng) -> Self {
        Self {
            remaining: count,
            next_id: 1,
            min_ms,
            spread_ms,
            rng,
        }
    }
}

impl CallSource for RandomCallSource {
    fn next_call(&mut self) -> Option<Call> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let id = self.next_id;
        self.next_id += 1;
        let duration_ms = self.min_ms + self.rng.gen_range(0..=self.spread_ms);
        Some(Call::new(id, duration_ms))
    }
}
