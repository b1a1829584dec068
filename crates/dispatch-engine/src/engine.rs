//! Engine composition root
//!
//! [`DispatchEngine`] wires every moving part together exactly once:
//! validates the configuration, builds the tier rosters and pools, threads
//! the escalation chain and recorder, and spawns the worker pool. All
//! sharing goes through `Arc`; there is no global state, so independent
//! engines can coexist in one process (the tests rely on that).
//!
//! # Examples
//!
//! ```no_run
//! use callsim_dispatch_engine::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let engine = DispatchEngine::new(EngineConfig::default())?;
//!     engine.run(FixedCallSource::new([1200, 800, 950])).await?;
//!     engine.drain().await?;
//!     println!("served: {}", engine.stats().await.calls_served);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::call::{Call, CallSource};
use crate::config::EngineConfig;
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::employee::{build_roster, Tier};
use crate::error::{EngineError, Result};
use crate::escalation::EscalationChain;
use crate::pool::TierPool;
use crate::recorder::{AssignmentRecorder, LogRecorder};
use crate::stats::EngineStats;

/// The assembled dispatch-and-escalation engine
///
/// Construct one per simulation via [`DispatchEngine::new`] or
/// [`DispatchEngine::builder`], feed it calls, then `drain` or `shutdown`.
pub struct DispatchEngine {
    config: EngineConfig,
    pools: Vec<Arc<TierPool>>,
    dispatcher: Dispatcher,
    stats: Arc<RwLock<EngineStats>>,
    cancel: CancellationToken,
}

impl DispatchEngine {
    /// Build an engine with the default logging recorder
    ///
    /// Validates `config` first; an invalid configuration never gets as far
    /// as spawning tasks. Must be called within a tokio runtime.
    pub fn new(config: EngineConfig) -> Result<Arc<Self>> {
        Self::builder(config).build()
    }

    /// Start configuring an engine
    pub fn builder(config: EngineConfig) -> DispatchEngineBuilder {
        DispatchEngineBuilder {
            config,
            recorder: None,
        }
    }

    /// Submit one call through the admission gate
    pub async fn dispatch(&self, call: Call) -> Result<DispatchOutcome> {
        self.dispatcher.dispatch(call).await
    }

    /// Feed every call a source yields through the dispatcher
    ///
    /// Returns once the source is exhausted or shutdown begins; queued and
    /// in-service calls keep running. Saturation drops inside are not
    /// errors; they surface in [`stats`](Self::stats).
    pub async fn run(&self, mut source: impl CallSource) -> Result<()> {
        let mut dispatched = 0u64;
        while !self.cancel.is_cancelled() {
            let Some(call) = source.next_call() else { break };
            self.dispatcher.dispatch(call).await?;
            dispatched += 1;
        }
        if dispatched == 0 && !self.cancel.is_cancelled() {
            error!("📵 call source produced no calls; nothing to dispatch");
        }
        Ok(())
    }

    /// Stop admissions and wait until every admitted call has been served
    pub async fn drain(&self) -> Result<()> {
        self.dispatcher.close();
        self.dispatcher.join_workers().await?;
        self.reconcile_abandoned().await;
        info!("🏁 engine drained: every admitted call settled");
        Ok(())
    }

    /// Cancel all in-flight work and stop the workers
    ///
    /// Calls being served or backing off are abandoned: employees return to
    /// their pools and no records are emitted for them. Idempotent.
    pub async fn shutdown(&self) -> Result<()> {
        info!("🛑 engine shutdown requested");
        self.dispatcher.close();
        self.cancel.cancel();
        self.dispatcher.join_workers().await?;
        self.reconcile_abandoned().await;
        info!("🛑 engine stopped");
        Ok(())
    }

    /// Snapshot of the engine counters
    pub async fn stats(&self) -> EngineStats {
        self.stats.read().await.clone()
    }

    /// Idle employees at one tier right now
    pub fn idle_count(&self, tier: Tier) -> usize {
        self.pools
            .iter()
            .find(|pool| pool.tier() == tier)
            .map(|pool| pool.idle_count())
            .unwrap_or(0)
    }

    /// Total head-count configured for one tier
    pub fn roster_size(&self, tier: Tier) -> usize {
        self.config.roster.count_for(tier)
    }

    /// The engine's configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fold queue-stranded calls into the abandoned count
    ///
    /// Only meaningful once the workers have stopped: at that point every
    /// accepted call is either served or abandoned, so the difference is
    /// exactly the calls that never reached a worker.
    async fn reconcile_abandoned(&self) {
        let mut stats = self.stats.write().await;
        debug_assert!(stats.calls_accepted >= stats.calls_served);
        stats.calls_abandoned = stats.calls_accepted - stats.calls_served;
    }
}

/// Builder for [`DispatchEngine`] in the usual server-builder shape
///
/// The only swappable part is the recorder; everything else comes from the
/// configuration.
pub struct DispatchEngineBuilder {
    config: EngineConfig,
    recorder: Option<Arc<dyn AssignmentRecorder>>,
}

impl DispatchEngineBuilder {
    /// Replace the default [`LogRecorder`] sink
    pub fn with_recorder(mut self, recorder: Arc<dyn AssignmentRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Validate the configuration and assemble the engine
    ///
    /// Must be called within a tokio runtime; this spawns the worker tasks.
    pub fn build(self) -> Result<Arc<DispatchEngine>> {
        let config = self.config;
        config.validate().map_err(EngineError::configuration)?;

        let recorder = self
            .recorder
            .unwrap_or_else(|| Arc::new(LogRecorder::new()));

        let pools: Vec<Arc<TierPool>> = Tier::CHAIN
            .iter()
            .map(|&tier| {
                Arc::new(TierPool::new(
                    tier,
                    build_roster(tier, config.roster.count_for(tier)),
                ))
            })
            .collect();

        let stats = Arc::new(RwLock::new(EngineStats::default()));
        let cancel = CancellationToken::new();
        let chain = Arc::new(EscalationChain::new(
            pools.clone(),
            config.backoff_interval(),
            recorder,
            cancel.clone(),
        ));
        let dispatcher = Dispatcher::new(&config, chain, Arc::clone(&stats), cancel.clone());

        info!(
            "🎯 dispatch engine ready: {} frontline / {} supervisor / {} senior",
            config.roster.frontline, config.roster.supervisor, config.roster.senior
        );

        Ok(Arc::new(DispatchEngine {
            config,
            pools,
            dispatcher,
            stats,
            cancel,
        }))
    }
}
