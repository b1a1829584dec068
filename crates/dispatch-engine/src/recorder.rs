//! Assignment records and recorder sinks
//!
//! Every successfully served call produces exactly one [`AssignmentRecord`],
//! delivered to an [`AssignmentRecorder`] from whichever worker task
//! completed the call. The recorder is the engine's observability seam:
//! the default [`LogRecorder`] writes assignments to the log, while
//! [`MemoryRecorder`] keeps them queryable for tests and inspection.
//! Dropped and abandoned calls never reach a recorder.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::call::CallId;
use crate::employee::{EmployeeId, Tier};

/// The durable fact that a specific employee served a specific call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    /// The served call
    pub call_id: CallId,

    /// The employee who served it
    pub employee_id: EmployeeId,

    /// The tier that employee belongs to
    pub tier: Tier,

    /// Global completion counter (0-based); orders records by completion
    pub sequence_index: u64,

    /// Completion wall-clock timestamp
    pub recorded_at: DateTime<Utc>,
}

impl fmt::Display for AssignmentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "call {} served by {} ({}, completion #{})",
            self.call_id, self.employee_id, self.tier, self.sequence_index
        )
    }
}

/// Sink for assignment outcomes
///
/// Called exactly once per successfully served call, concurrently from
/// multiple worker tasks; implementations must be safe for that.
#[async_trait]
pub trait AssignmentRecorder: Send + Sync {
    /// Accept one completed assignment
    async fn record(&self, record: AssignmentRecord);
}

/// Recorder that writes each assignment to the log
///
/// The default sink for simulation runs.
#[derive(Debug, Default)]
pub struct LogRecorder;

impl LogRecorder {
    /// Create a new log recorder
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AssignmentRecorder for LogRecorder {
    async fn record(&self, record: AssignmentRecord) {
        info!("📝 {}", record);
    }
}

/// Recorder that keeps every assignment in memory
///
/// Backs the test assertions: records are queryable by call id and readable
/// in completion order.
///
/// # Examples
///
/// ```
/// use callsim_dispatch_engine::MemoryRecorder;
///
/// let recorder = MemoryRecorder::new();
/// assert!(recorder.is_empty());
/// assert!(recorder.employee_for_call(1).is_none());
/// ```
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    by_call: DashMap<CallId, AssignmentRecord>,
    ordered: Mutex<Vec<AssignmentRecord>>,
}

impl MemoryRecorder {
    /// Create a new, empty memory recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Who served the given call, if it completed
    pub fn employee_for_call(&self, call_id: impl Into<CallId>) -> Option<EmployeeId> {
        self.by_call
            .get(&call_id.into())
            .map(|entry| entry.employee_id.clone())
    }

    /// The tier that served the given call, if it completed
    pub fn tier_for_call(&self, call_id: impl Into<CallId>) -> Option<Tier> {
        self.by_call.get(&call_id.into()).map(|entry| entry.tier)
    }

    /// All records in completion order
    pub fn records(&self) -> Vec<AssignmentRecord> {
        self.ordered.lock().clone()
    }

    /// Number of completed calls recorded
    pub fn len(&self) -> usize {
        self.ordered.lock().len()
    }

    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AssignmentRecorder for MemoryRecorder {
    async fn record(&self, record: AssignmentRecord) {
        let previous = self.by_call.insert(record.call_id, record.clone());
        assert!(
            previous.is_none(),
            "call {} recorded twice",
            record.call_id
        );
        self.ordered.lock().push(record);
    }
}
