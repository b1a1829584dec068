//! Escalation chain state machine
//!
//! Each accepted call runs one instance of this state machine on a worker
//! task, walking the tiers in priority order until an employee is free:
//!
//! ```text
//!      ┌─────────────────────── backoff elapsed ───────────────────────┐
//!      ▼                                                               │
//!  TryTier(1) ─miss→ TryTier(2) ─miss→ ... ─miss→ TryTier(K) ─miss→ Backoff
//!      │ hit              │ hit                        │ hit
//!      └──────────────────┴──────────────┬─────────────┘
//!                                        ▼
//!                                     Serving ─complete→ Done
//! ```
//!
//! Misses walk the chain with no delay. Only the last tier backs off, and
//! the restart goes all the way back to tier 1, so a fully-escalated call
//! can claim a low-tier employee freed during its backoff window, ahead of
//! newer calls that are still mid-chain. That matches the behavior this
//! engine reproduces; see DESIGN.md for the fairness note.
//!
//! There is no retry cap: a call loops through Backoff until some tier
//! yields an employee or the engine shuts down. Both timed waits (Serving
//! and Backoff) race the engine's cancellation token; a cancelled call is
//! abandoned, any employee it holds goes straight back to its pool, and no
//! record is emitted.
//!
//! The chain is one value type per tier ([`TierHandler`]) wired by index,
//! and the walk is an explicit loop: sustained contention cannot grow the
//! stack.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::call::Call;
use crate::employee::Tier;
use crate::pool::{PooledEmployee, TierPool};
use crate::recorder::{AssignmentRecord, AssignmentRecorder};

/// Result of a cancellable timed wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full duration elapsed
    Completed,
    /// The cancellation token fired first
    Cancelled,
}

/// Terminal outcome of one chain execution
#[derive(Debug)]
pub enum ChainOutcome {
    /// The call was served to completion and recorded
    Served(AssignmentRecord),

    /// Shutdown interrupted the call; nothing was recorded
    Abandoned,
}

/// One tier's slot in the escalation chain
///
/// A plain value configured by `(tier, pool, next-or-none)`; the last slot
/// additionally carries the restart-chain-on-failure behavior. There are no
/// per-tier subtypes.
#[derive(Debug)]
pub struct TierHandler {
    tier: Tier,
    pool: Arc<TierPool>,
    /// Index of the next handler in the chain, `None` for the last tier
    next: Option<usize>,
    /// Set only on the last tier: a miss backs off and restarts the chain
    restart_chain_on_failure: bool,
}

impl TierHandler {
    /// The tier this handler tries
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Whether this is the chain's last tier
    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }
}

/// Per-call chain state
#[derive(Debug)]
enum ChainState {
    /// Trying the handler at this index
    TryTier(usize),
    /// Holding an employee for the call's service duration
    Serving(PooledEmployee),
    /// All tiers missed; waiting before restarting from tier 1
    Backoff,
    /// Terminal
    Done(ChainOutcome),
}

/// The ordered escalation chain shared by all worker tasks
///
/// Owns the tier handlers, the completion sequence counter, and the recorder
/// wiring. One chain instance is built by the engine at start-up and shared
/// (`Arc`) across workers; `execute` is reentrant, one invocation per call.
pub struct EscalationChain {
    handlers: Vec<TierHandler>,
    backoff_interval: Duration,
    recorder: Arc<dyn AssignmentRecorder>,
    completion_sequence: AtomicU64,
    cancel: CancellationToken,
}

impl EscalationChain {
    /// Wire the chain from pools in escalation order
    ///
    /// # Panics
    ///
    /// Panics if `pools` is empty; the engine always passes one pool per
    /// tier.
    pub fn new(
        pools: Vec<Arc<TierPool>>,
        backoff_interval: Duration,
        recorder: Arc<dyn AssignmentRecorder>,
        cancel: CancellationToken,
    ) -> Self {
        assert!(!pools.is_empty(), "escalation chain needs at least one tier");
        let last = pools.len() - 1;
        let handlers = pools
            .into_iter()
            .enumerate()
            .map(|(index, pool)| TierHandler {
                tier: pool.tier(),
                pool,
                next: if index < last { Some(index + 1) } else { None },
                restart_chain_on_failure: index == last,
            })
            .collect();
        Self {
            handlers,
            backoff_interval,
            recorder,
            completion_sequence: AtomicU64::new(0),
            cancel,
        }
    }

    /// The chain's handlers in escalation order
    pub fn handlers(&self) -> &[TierHandler] {
        &self.handlers
    }

    /// Run one call through the chain to its terminal outcome
    ///
    /// Returns when the call has been served (recorded, employee released)
    /// or abandoned by shutdown (employee released, nothing recorded).
    pub async fn execute(&self, call: Call) -> ChainOutcome {
        let mut state = ChainState::TryTier(0);
        loop {
            state = match state {
                ChainState::TryTier(index) => self.try_tier(&call, index),
                ChainState::Serving(employee) => self.serve(&call, employee).await,
                ChainState::Backoff => self.backoff(&call).await,
                ChainState::Done(outcome) => return outcome,
            };
        }
    }

    /// Non-blocking acquire attempt at one tier
    fn try_tier(&self, call: &Call, index: usize) -> ChainState {
        let handler = &self.handlers[index];
        match handler.pool.try_acquire() {
            Some(employee) => {
                debug!(
                    "📞 {} picked up by {} ({})",
                    call,
                    employee.id(),
                    handler.tier
                );
                ChainState::Serving(employee)
            }
            None => match handler.next {
                Some(next) => {
                    debug!(
                        "no idle {} for {}; escalating to {}",
                        handler.tier, call, self.handlers[next].tier
                    );
                    ChainState::TryTier(next)
                }
                None => {
                    assert!(
                        handler.restart_chain_on_failure,
                        "chain tail without restart behavior"
                    );
                    ChainState::Backoff
                }
            },
        }
    }

    /// Hold the employee for the call's service duration, then record
    async fn serve(&self, call: &Call, employee: PooledEmployee) -> ChainState {
        match self.wait(call.service_duration()).await {
            WaitOutcome::Completed => {
                let employee_id = employee.id().clone();
                let tier = employee.tier();
                // Release before the record is emitted: the employee must be
                // back in its pool by the time the outcome is observable.
                drop(employee);
                let record = AssignmentRecord {
                    call_id: call.id(),
                    employee_id,
                    tier,
                    sequence_index: self.completion_sequence.fetch_add(1, Ordering::SeqCst),
                    recorded_at: Utc::now(),
                };
                self.recorder.record(record.clone()).await;
                ChainState::Done(ChainOutcome::Served(record))
            }
            WaitOutcome::Cancelled => {
                warn!(
                    "🛑 {} interrupted while served by {}; releasing the employee, no record",
                    call,
                    employee.id()
                );
                drop(employee);
                ChainState::Done(ChainOutcome::Abandoned)
            }
        }
    }

    /// All tiers missed: wait, then restart from tier 1
    async fn backoff(&self, call: &Call) -> ChainState {
        info!(
            "⏳ no idle employees at any tier for {}; retrying from {} in {:?}",
            call, self.handlers[0].tier, self.backoff_interval
        );
        match self.wait(self.backoff_interval).await {
            WaitOutcome::Completed => ChainState::TryTier(0),
            WaitOutcome::Cancelled => {
                warn!("🛑 {} interrupted during backoff; abandoned", call);
                ChainState::Done(ChainOutcome::Abandoned)
            }
        }
    }

    /// Timed wait racing the cancellation token
    async fn wait(&self, duration: Duration) -> WaitOutcome {
        tokio::select! {
            _ = sleep(duration) => WaitOutcome::Completed,
            _ = self.cancel.cancelled() => WaitOutcome::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::employee::build_roster;
    use crate::recorder::MemoryRecorder;

    fn pools(frontline: usize, supervisor: usize, senior: usize) -> Vec<Arc<TierPool>> {
        vec![
            Arc::new(TierPool::new(
                Tier::Frontline,
                build_roster(Tier::Frontline, frontline),
            )),
            Arc::new(TierPool::new(
                Tier::Supervisor,
                build_roster(Tier::Supervisor, supervisor),
            )),
            Arc::new(TierPool::new(Tier::Senior, build_roster(Tier::Senior, senior))),
        ]
    }

    fn chain_with(
        pools: Vec<Arc<TierPool>>,
        backoff_ms: u64,
        recorder: Arc<MemoryRecorder>,
    ) -> Arc<EscalationChain> {
        Arc::new(EscalationChain::new(
            pools,
            Duration::from_millis(backoff_ms),
            recorder,
            CancellationToken::new(),
        ))
    }

    #[test]
    fn test_handlers_are_wired_in_escalation_order() {
        let recorder = Arc::new(MemoryRecorder::new());
        let chain = chain_with(pools(1, 1, 1), 500, recorder);

        let tiers: Vec<Tier> = chain.handlers().iter().map(|h| h.tier()).collect();
        assert_eq!(tiers, vec![Tier::Frontline, Tier::Supervisor, Tier::Senior]);
        assert!(!chain.handlers()[0].is_last());
        assert!(!chain.handlers()[1].is_last());
        assert!(chain.handlers()[2].is_last());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_fan_out_across_the_tiers() {
        let recorder = Arc::new(MemoryRecorder::new());
        let chain = chain_with(pools(1, 1, 1), 500, Arc::clone(&recorder));

        let mut tasks = Vec::new();
        for id in 1..=3u64 {
            let chain = Arc::clone(&chain);
            tasks.push(tokio::spawn(async move {
                chain.execute(Call::new(id, 100)).await
            }));
        }
        for task in tasks {
            assert!(matches!(
                task.await.expect("chain task"),
                ChainOutcome::Served(_)
            ));
        }

        assert_eq!(recorder.tier_for_call(1), Some(Tier::Frontline));
        assert_eq!(recorder.tier_for_call(2), Some(Tier::Supervisor));
        assert_eq!(recorder.tier_for_call(3), Some(Tier::Senior));
    }

    #[tokio::test(start_paused = true)]
    async fn test_a_fully_escalated_call_restarts_from_tier_one() {
        let recorder = Arc::new(MemoryRecorder::new());
        // Only one employee in the whole center, at tier 1.
        let chain = chain_with(pools(1, 0, 0), 500, Arc::clone(&recorder));

        let first = {
            let chain = Arc::clone(&chain);
            tokio::spawn(async move { chain.execute(Call::new(1, 300)).await })
        };
        let second = {
            let chain = Arc::clone(&chain);
            tokio::spawn(async move { chain.execute(Call::new(2, 100)).await })
        };

        first.await.expect("first call");
        second.await.expect("second call");

        // Call 2 misses every tier, backs off, and wins the tier-1 employee
        // freed while it was waiting.
        assert_eq!(recorder.tier_for_call(2), Some(Tier::Frontline));
        assert_eq!(
            recorder.employee_for_call(2),
            recorder.employee_for_call(1)
        );

        let sequence: Vec<u64> = recorder.records().iter().map(|r| r.call_id.0).collect();
        assert_eq!(sequence, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_repeats_until_an_employee_frees_up() {
        let recorder = Arc::new(MemoryRecorder::new());
        let chain = chain_with(pools(1, 0, 0), 500, Arc::clone(&recorder));

        // The only employee stays busy across three backoff windows.
        let long = {
            let chain = Arc::clone(&chain);
            tokio::spawn(async move { chain.execute(Call::new(1, 1600)).await })
        };
        let patient = {
            let chain = Arc::clone(&chain);
            tokio::spawn(async move { chain.execute(Call::new(2, 100)).await })
        };

        long.await.expect("long call");
        patient.await.expect("patient call");

        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.tier_for_call(2), Some(Tier::Frontline));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_order_drives_the_sequence_index() {
        let recorder = Arc::new(MemoryRecorder::new());
        let chain = chain_with(pools(2, 0, 0), 500, Arc::clone(&recorder));

        let slow = {
            let chain = Arc::clone(&chain);
            tokio::spawn(async move { chain.execute(Call::new(1, 400)).await })
        };
        let fast = {
            let chain = Arc::clone(&chain);
            tokio::spawn(async move { chain.execute(Call::new(2, 100)).await })
        };

        slow.await.expect("slow call");
        fast.await.expect("fast call");

        let records = recorder.records();
        assert_eq!(records[0].call_id.0, 2);
        assert_eq!(records[0].sequence_index, 0);
        assert_eq!(records[1].call_id.0, 1);
        assert_eq!(records[1].sequence_index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_serving_releases_and_records_nothing() {
        let recorder = Arc::new(MemoryRecorder::new());
        let cancel = CancellationToken::new();
        let pool = Arc::new(TierPool::new(
            Tier::Frontline,
            build_roster(Tier::Frontline, 1),
        ));
        let chain = Arc::new(EscalationChain::new(
            vec![Arc::clone(&pool)],
            Duration::from_millis(500),
            Arc::clone(&recorder) as Arc<dyn AssignmentRecorder>,
            cancel.clone(),
        ));

        let task = {
            let chain = Arc::clone(&chain);
            tokio::spawn(async move { chain.execute(Call::new(1, 60_000)).await })
        };

        // Let the call acquire its employee and settle into Serving.
        sleep(Duration::from_millis(10)).await;
        assert_eq!(pool.idle_count(), 0);

        cancel.cancel();
        let outcome = task.await.expect("serving task");
        assert!(matches!(outcome, ChainOutcome::Abandoned));

        assert_eq!(pool.idle_count(), 1);
        assert!(recorder.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_backoff_abandons_without_a_record() {
        let recorder = Arc::new(MemoryRecorder::new());
        let cancel = CancellationToken::new();
        let chain = Arc::new(EscalationChain::new(
            pools(0, 0, 0),
            Duration::from_millis(60_000),
            Arc::clone(&recorder) as Arc<dyn AssignmentRecorder>,
            cancel.clone(),
        ));

        let task = {
            let chain = Arc::clone(&chain);
            tokio::spawn(async move { chain.execute(Call::new(1, 100)).await })
        };

        sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        let outcome = task.await.expect("backoff task");
        assert!(matches!(outcome, ChainOutcome::Abandoned));
        assert!(recorder.is_empty());
    }
}
