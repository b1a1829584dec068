//! Call admission and the worker pool
//!
//! The dispatcher accepts calls into a bounded admission path and feeds them
//! to a fixed set of worker tasks, each of which runs the escalation chain
//! for one call at a time:
//!
//! ```text
//!  dispatch(call) ──try──▶ [permit: W+Q] ──▶ queue ──▶ worker 1..W ──▶ chain
//!        │ no permit
//!        ▼
//!   drop + cooldown
//! ```
//!
//! Capacity accounting rides on a semaphore with `W + Q` permits: a call
//! takes one permit at admission and holds it until its chain execution
//! finishes, so "in flight" covers both queued and being-served calls. When
//! no permit is free the call is dropped on the spot, with no retry and no
//! waiting for a slot, and the submitter is penalized with a cooldown pause
//! before the next submission. This reproduces a hard-saturation policy: under a burst
//! of `W + Q + n` submissions against busy workers, exactly `n` calls drop.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{Mutex, OwnedSemaphorePermit, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::call::Call;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::escalation::{ChainOutcome, EscalationChain};
use crate::stats::EngineStats;

/// What happened to a submitted call at the admission gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Queued; a worker will run its escalation chain
    Accepted,
    /// No capacity; the call is gone and the submitter was cooled down
    Dropped,
}

/// An admitted call and the capacity permit it occupies
///
/// The permit is held through queueing and chain execution; dropping the job
/// on any path frees the admission slot.
struct DispatchJob {
    call: Call,
    _permit: OwnedSemaphorePermit,
}

/// Bounded admission gate plus the worker pool behind it
pub struct Dispatcher {
    admission: Arc<Semaphore>,
    capacity: usize,
    rejection_cooldown: Duration,
    queue_tx: parking_lot::Mutex<Option<mpsc::Sender<DispatchJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    stats: Arc<RwLock<EngineStats>>,
    cancel: CancellationToken,
}

impl Dispatcher {
    /// Build the admission path and spawn the worker tasks
    ///
    /// Must run inside a tokio runtime. `config` is assumed validated.
    pub fn new(
        config: &EngineConfig,
        chain: Arc<EscalationChain>,
        stats: Arc<RwLock<EngineStats>>,
        cancel: CancellationToken,
    ) -> Self {
        let capacity = config.admission_capacity();
        let (queue_tx, queue_rx) = mpsc::channel(capacity);
        let queue_rx = Arc::new(Mutex::new(queue_rx));

        let mut workers = Vec::with_capacity(config.dispatcher.worker_count);
        for worker_id in 0..config.dispatcher.worker_count {
            workers.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&queue_rx),
                Arc::clone(&chain),
                Arc::clone(&stats),
                cancel.clone(),
            )));
        }
        info!(
            "🚀 dispatcher up: {} workers, {} queue slots",
            config.dispatcher.worker_count, config.dispatcher.admission_queue_capacity
        );

        Self {
            admission: Arc::new(Semaphore::new(capacity)),
            capacity,
            rejection_cooldown: config.rejection_cooldown(),
            queue_tx: parking_lot::Mutex::new(Some(queue_tx)),
            workers: Mutex::new(workers),
            stats,
            cancel,
        }
    }

    /// Submit one call through the admission gate
    ///
    /// Non-blocking on the happy path. On saturation the call is dropped and
    /// this method sleeps the rejection cooldown before returning, so a
    /// submission loop driving it is paused after every drop. Errors only
    /// when the engine has begun shutting down.
    pub async fn dispatch(&self, call: Call) -> Result<DispatchOutcome> {
        let Some(sender) = self.queue_tx.lock().clone() else {
            return Err(EngineError::dispatch(format!(
                "{call} submitted after admission closed"
            )));
        };
        self.stats.write().await.calls_submitted += 1;

        let permit = match Arc::clone(&self.admission).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.stats.write().await.calls_dropped += 1;
                warn!(
                    "🚫 {} dropped: {} calls in flight, no capacity left; cooling down {:?}",
                    call, self.capacity, self.rejection_cooldown
                );
                tokio::select! {
                    _ = sleep(self.rejection_cooldown) => {}
                    _ = self.cancel.cancelled() => {}
                }
                return Ok(DispatchOutcome::Dropped);
            }
        };

        let label = call.to_string();
        match sender.try_send(DispatchJob {
            call,
            _permit: permit,
        }) {
            Ok(()) => {
                self.stats.write().await.calls_accepted += 1;
                debug!("📥 {} admitted", label);
                Ok(DispatchOutcome::Accepted)
            }
            // The queue is sized to the permit count, so a granted permit
            // always has a buffer slot.
            Err(TrySendError::Full(_)) => Err(EngineError::internal(
                "admission permit granted but the dispatch queue is full",
            )),
            Err(TrySendError::Closed(_)) => Err(EngineError::dispatch(format!(
                "{label} submitted while the engine was shutting down"
            ))),
        }
    }

    /// Stop admitting new calls; already-queued calls will still be served
    ///
    /// Idempotent. After this, workers exit once the queue empties.
    pub fn close(&self) {
        if self.queue_tx.lock().take().is_some() {
            info!("📪 admission closed; draining queued calls");
        }
    }

    /// Wait for every worker task to finish
    ///
    /// Call after [`close`](Self::close) to drain, or after cancelling the
    /// engine token to stop. Idempotent.
    pub async fn join_workers(&self) -> Result<()> {
        let handles: Vec<_> = {
            let mut workers = self.workers.lock().await;
            workers.drain(..).collect()
        };
        for handle in handles {
            handle
                .await
                .map_err(|e| EngineError::shutdown(format!("worker task failed: {e}")))?;
        }
        Ok(())
    }

    /// Admission slots currently free
    pub fn available_capacity(&self) -> usize {
        self.admission.available_permits()
    }
}

/// One worker: pull a call, run its chain, repeat
///
/// Workers share a single receiver behind a lock so the queue stays strictly
/// FIFO across the pool. The lock is released before the chain runs.
async fn worker_loop(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::Receiver<DispatchJob>>>,
    chain: Arc<EscalationChain>,
    stats: Arc<RwLock<EngineStats>>,
    cancel: CancellationToken,
) {
    debug!("worker {} up", worker_id);
    loop {
        let job = {
            let mut receiver = queue.lock().await;
            tokio::select! {
                // Once shutdown begins, never start another call.
                biased;
                _ = cancel.cancelled() => None,
                job = receiver.recv() => job,
            }
        };
        let Some(job) = job else {
            break;
        };

        let DispatchJob { call, _permit } = job;
        match chain.execute(call).await {
            ChainOutcome::Served(record) => {
                let mut stats = stats.write().await;
                stats.calls_served += 1;
                stats.assignments_by_tier.increment(record.tier);
            }
            ChainOutcome::Abandoned => {
                stats.write().await.calls_abandoned += 1;
            }
        }
        // _permit drops here: the admission slot frees only after the call
        // left the system.
    }
    debug!("worker {} down", worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::employee::{build_roster, Tier};
    use crate::pool::TierPool;
    use crate::recorder::MemoryRecorder;

    struct Fixture {
        dispatcher: Dispatcher,
        recorder: Arc<MemoryRecorder>,
        stats: Arc<RwLock<EngineStats>>,
        cancel: CancellationToken,
    }

    fn fixture(worker_count: usize, queue_capacity: usize, frontline: usize) -> Fixture {
        let mut config = EngineConfig::default();
        config.dispatcher.worker_count = worker_count;
        config.dispatcher.admission_queue_capacity = queue_capacity;
        config.roster.frontline = frontline;
        config.roster.supervisor = 0;
        config.roster.senior = 0;

        let recorder = Arc::new(MemoryRecorder::new());
        let stats = Arc::new(RwLock::new(EngineStats::default()));
        let cancel = CancellationToken::new();
        let pools = vec![Arc::new(TierPool::new(
            Tier::Frontline,
            build_roster(Tier::Frontline, frontline),
        ))];
        let chain = Arc::new(EscalationChain::new(
            pools,
            config.backoff_interval(),
            Arc::clone(&recorder) as Arc<dyn crate::recorder::AssignmentRecorder>,
            cancel.clone(),
        ));
        let dispatcher = Dispatcher::new(&config, chain, Arc::clone(&stats), cancel.clone());
        Fixture {
            dispatcher,
            recorder,
            stats,
            cancel,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepted_calls_are_served_by_the_workers() {
        let fx = fixture(2, 2, 2);

        for id in 1..=3u64 {
            let outcome = fx.dispatcher.dispatch(Call::new(id, 100)).await;
            assert_eq!(outcome.expect("dispatch"), DispatchOutcome::Accepted);
        }
        fx.dispatcher.close();
        fx.dispatcher.join_workers().await.expect("drain");

        assert_eq!(fx.recorder.len(), 3);
        let stats = fx.stats.read().await;
        assert_eq!(stats.calls_submitted, 3);
        assert_eq!(stats.calls_accepted, 3);
        assert_eq!(stats.calls_served, 3);
        assert_eq!(stats.calls_dropped, 0);
        assert_eq!(stats.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_saturation_drops_exactly_the_overflow() {
        // Capacity is 2 workers + 1 slot; the single employee never frees
        // during the burst, so the fourth call must drop.
        let fx = fixture(2, 1, 1);

        let mut outcomes = Vec::new();
        for id in 1..=4u64 {
            outcomes.push(fx.dispatcher.dispatch(Call::new(id, 600_000)).await.expect("dispatch"));
        }
        assert_eq!(
            outcomes,
            vec![
                DispatchOutcome::Accepted,
                DispatchOutcome::Accepted,
                DispatchOutcome::Accepted,
                DispatchOutcome::Dropped,
            ]
        );

        {
            let stats = fx.stats.read().await;
            assert_eq!(stats.calls_submitted, 4);
            assert_eq!(stats.calls_accepted, 3);
            assert_eq!(stats.calls_dropped, 1);
        }

        fx.cancel.cancel();
        fx.dispatcher.join_workers().await.expect("stop");
        assert!(fx.recorder.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_a_drop_pauses_the_submitter_for_the_cooldown() {
        let fx = fixture(1, 1, 1);

        // Fill the worker and the one queue slot; the third call must drop.
        fx.dispatcher.dispatch(Call::new(1, 600_000)).await.expect("dispatch");
        fx.dispatcher.dispatch(Call::new(2, 600_000)).await.expect("dispatch");

        let before = tokio::time::Instant::now();
        let outcome = fx.dispatcher.dispatch(Call::new(3, 600_000)).await.expect("dispatch");
        assert_eq!(outcome, DispatchOutcome::Dropped);
        assert!(
            before.elapsed() >= fx.dispatcher.rejection_cooldown,
            "a rejected submission must hold the submitter for the cooldown"
        );
        assert_eq!(fx.stats.read().await.calls_dropped, 1);

        fx.cancel.cancel();
        fx.dispatcher.join_workers().await.expect("stop");
    }

    #[tokio::test(start_paused = true)]
    async fn test_a_freed_slot_admits_again() {
        let fx = fixture(1, 1, 1);

        // Fill both slots, then let the short call finish.
        fx.dispatcher.dispatch(Call::new(1, 100)).await.expect("dispatch");
        fx.dispatcher.dispatch(Call::new(2, 100)).await.expect("dispatch");
        sleep(Duration::from_millis(300)).await;

        assert_eq!(fx.dispatcher.available_capacity(), 2);
        let outcome = fx.dispatcher.dispatch(Call::new(3, 100)).await.expect("dispatch");
        assert_eq!(outcome, DispatchOutcome::Accepted);

        fx.dispatcher.close();
        fx.dispatcher.join_workers().await.expect("drain");
        assert_eq!(fx.recorder.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_after_close_is_an_error() {
        let fx = fixture(1, 1, 1);
        fx.dispatcher.close();
        fx.dispatcher.close(); // idempotent

        let result = fx.dispatcher.dispatch(Call::new(1, 100)).await;
        assert!(matches!(result, Err(EngineError::Dispatch(_))));

        fx.dispatcher.join_workers().await.expect("drain");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_into_stopped_workers_is_an_error() {
        let fx = fixture(2, 1, 1);

        // Stop the workers without closing admission: the queue receiver is
        // gone, so a submission that wins a permit still cannot be handed off.
        fx.cancel.cancel();
        fx.dispatcher.join_workers().await.expect("stop");

        let result = fx.dispatcher.dispatch(Call::new(1, 100)).await;
        assert!(matches!(result, Err(EngineError::Dispatch(_))));
        assert_eq!(fx.stats.read().await.calls_accepted, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_a_busy_worker_without_a_record() {
        let fx = fixture(1, 2, 1);

        // One call being served, two stranded in the queue.
        for id in 1..=3u64 {
            fx.dispatcher.dispatch(Call::new(id, 600_000)).await.expect("dispatch");
        }
        sleep(Duration::from_millis(10)).await;

        fx.cancel.cancel();
        fx.dispatcher.join_workers().await.expect("stop");

        let stats = fx.stats.read().await;
        assert_eq!(stats.calls_abandoned, 1);
        assert_eq!(stats.calls_served, 0);
        assert!(fx.recorder.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_workers_stop_on_cancellation() {
        let fx = fixture(3, 1, 1);
        fx.cancel.cancel();
        fx.dispatcher.join_workers().await.expect("stop");
        fx.dispatcher.join_workers().await.expect("idempotent");
    }
}
