//! # CallSim Dispatch Engine
//!
//! A call-center dispatch and escalation simulator. A fixed roster of
//! employees on three seniority tiers serves a stream of incoming calls;
//! calls that find no idle employee escalate tier by tier, back off, and
//! try again from the bottom. The engine reproduces the saturation and
//! contention behavior of a real dispatch floor in a deterministic,
//! testable core.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Bounded admission**: a worker pool of `W` tasks fronted by a `Q`-slot
//!   queue; submissions beyond `W + Q` in-flight calls are dropped on the
//!   spot and the submitter is penalized with a cooldown pause
//! - **Tiered escalation**: one parameterized handler per tier, wired into a
//!   chain that walks Frontline → Supervisor → Senior with no delay between
//!   misses, and restarts from tier 1 after a full miss plus backoff
//! - **Strict employee accounting**: per-tier pools with non-blocking
//!   acquire and guard-based release, so `idle + serving == total` holds at
//!   every instant and an employee never serves two calls at once
//! - **Exactly-once outcomes**: every served call emits one assignment
//!   record through a pluggable recorder; abandoned calls emit nothing
//! - **Deterministic replay**: fixed or seeded call sources make whole runs
//!   reproducible
//!
//! ## Architecture
//!
//! ```text
//!                       ┌──────────────────┐
//!    CallSource ──────▶ │  DispatchEngine  │
//!                       └────────┬─────────┘
//!                                │ dispatch
//!                       ┌────────▼─────────┐    drop + cooldown
//!                       │  admission gate  │ ──────────────────▶ (rejected)
//!                       │  (W + Q permits) │
//!                       └────────┬─────────┘
//!                                │ FIFO queue
//!                 ┌──────────────┼──────────────┐
//!                 ▼              ▼              ▼
//!             worker 1       worker 2   ...  worker W
//!                 │              │              │
//!                 └──────────────┼──────────────┘
//!                                ▼
//!                       escalation chain
//!             Frontline ─▶ Supervisor ─▶ Senior ─▶ backoff ─┐
//!                 ▲                                         │
//!                 └────────── restart from tier 1 ◀─────────┘
//!                                │
//!                                ▼
//!                       AssignmentRecorder
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use callsim_dispatch_engine::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! // Ten random-duration calls against the default 5/3/2 roster.
//! let engine = DispatchEngine::new(EngineConfig::default())?;
//! engine.run(RandomCallSource::new(10, 5000, 5000)).await?;
//! engine.drain().await?;
//!
//! let stats = engine.stats().await;
//! println!(
//!     "served {} of {} submitted ({} dropped)",
//!     stats.calls_served, stats.calls_submitted, stats.calls_dropped
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ### Observing assignments
//!
//! ```
//! use callsim_dispatch_engine::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<()> {
//! let recorder = Arc::new(MemoryRecorder::new());
//! let engine = DispatchEngine::builder(EngineConfig::default())
//!     .with_recorder(recorder.clone())
//!     .build()?;
//!
//! engine.run(FixedCallSource::new([2000, 1500, 900])).await?;
//! engine.drain().await?;
//!
//! for record in recorder.records() {
//!     println!("{record}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Shutdown semantics
//!
//! [`DispatchEngine::drain`] stops admissions and waits until every
//! admitted call has been served. [`DispatchEngine::shutdown`] cancels
//! instead: calls mid-service or mid-backoff release their employees and
//! are counted abandoned, with no record emitted. Either way the pools end
//! full.

// Core modules
pub mod error;
pub mod config;

// Domain model
pub mod call;
pub mod employee;

// Concurrency machinery
pub mod pool;
pub mod escalation;
pub mod dispatcher;

// Outcomes and composition
pub mod recorder;
pub mod stats;
pub mod engine;

// Re-exports for convenience
pub use error::{EngineError, Result};
pub use config::EngineConfig;
pub use engine::{DispatchEngine, DispatchEngineBuilder};
pub use call::{Call, CallId, CallSource, FixedCallSource, RandomCallSource};
pub use employee::{Employee, EmployeeId, Tier};
pub use dispatcher::DispatchOutcome;
pub use recorder::{AssignmentRecord, AssignmentRecorder, LogRecorder, MemoryRecorder};
pub use stats::{EngineStats, TierCounts};

/// Prelude module for convenient imports
///
/// ```
/// use callsim_dispatch_engine::prelude::*;
/// ```
pub mod prelude {
    //! Commonly used types for driving the dispatch engine

    // Engine surface
    pub use crate::engine::{DispatchEngine, DispatchEngineBuilder};
    pub use crate::error::{EngineError, Result};

    // Configuration
    pub use crate::config::{
        CallDurationConfig, DispatcherConfig, EngineConfig, EscalationConfig, RosterConfig,
    };

    // Domain model
    pub use crate::call::{Call, CallId, CallSource, FixedCallSource, RandomCallSource};
    pub use crate::employee::{Employee, EmployeeId, Tier};

    // Pools and escalation
    pub use crate::escalation::{ChainOutcome, EscalationChain, TierHandler, WaitOutcome};
    pub use crate::pool::{PooledEmployee, TierPool};

    // Outcomes
    pub use crate::dispatcher::DispatchOutcome;
    pub use crate::recorder::{AssignmentRecord, AssignmentRecorder, LogRecorder, MemoryRecorder};
    pub use crate::stats::{EngineStats, TierCounts};

    // Common external types
    pub use chrono::{DateTime, Utc};
}
