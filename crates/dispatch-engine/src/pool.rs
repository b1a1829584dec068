//! Tier pools of idle employees
//!
//! A [`TierPool`] is the single shared mutable resource of one tier: a
//! bounded set of currently-idle employees with a non-blocking
//! [`try_acquire`](TierPool::try_acquire) and a never-blocking
//! [`release`](TierPool::release). Acquisition hands back a
//! [`PooledEmployee`] guard; dropping the guard returns the employee to the
//! pool it came from, even when the serving task is cancelled mid-call,
//! which keeps the accounting invariant `idle + serving == total` on every
//! exit path.
//!
//! Releasing an employee into a foreign tier's pool, or overfilling a pool,
//! is a broken invariant and fails fast.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::employee::{Employee, EmployeeId, Tier};

/// Bounded thread-safe container of idle employees for one tier
pub struct TierPool {
    tier: Tier,
    capacity: usize,
    idle: Mutex<VecDeque<Employee>>,
}

impl TierPool {
    /// Create a pool holding the full roster of one tier
    ///
    /// Capacity is fixed to the roster size; the pool starts full.
    ///
    /// # Panics
    ///
    /// Panics if any roster member belongs to a different tier.
    pub fn new(tier: Tier, roster: Vec<Employee>) -> Self {
        for employee in &roster {
            assert_eq!(
                employee.tier, tier,
                "employee {} of tier {} placed in the {} pool",
                employee.id, employee.tier, tier
            );
        }
        let capacity = roster.len();
        Self {
            tier,
            capacity,
            idle: Mutex::new(roster.into()),
        }
    }

    /// Try to take an idle employee, returning immediately either way
    ///
    /// No fairness guarantee: whichever caller wins the pool's internal lock
    /// race gets the employee.
    pub fn try_acquire(self: &Arc<Self>) -> Option<PooledEmployee> {
        let employee = {
            let mut idle = self.idle.lock();
            let employee = idle.pop_front()?;
            debug!(
                "{} acquired from the {} pool ({} idle left)",
                employee.id,
                self.tier,
                idle.len()
            );
            employee
        };
        Some(PooledEmployee {
            employee: Some(employee),
            pool: Arc::clone(self),
        })
    }

    /// Return an employee to the idle set
    ///
    /// Never blocks: capacity equals the fixed tier size and employees are
    /// released exactly once per acquire, so the pool cannot be over-full
    /// unless an invariant is already broken.
    ///
    /// # Panics
    ///
    /// Panics if the employee belongs to another tier or the pool is already
    /// at capacity.
    pub fn release(&self, employee: Employee) {
        assert_eq!(
            employee.tier, self.tier,
            "employee {} of tier {} released to the {} pool",
            employee.id, employee.tier, self.tier
        );
        let mut idle = self.idle.lock();
        assert!(
            idle.len() < self.capacity,
            "{} pool overfull: releasing {} past capacity {}",
            self.tier,
            employee.id,
            self.capacity
        );
        debug!(
            "{} released back to the {} pool ({} idle)",
            employee.id,
            self.tier,
            idle.len() + 1
        );
        idle.push_back(employee);
    }

    /// The tier this pool serves
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Fixed total number of employees of this tier
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Employees currently idle in the pool
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Employees of this tier currently serving a call
    pub fn serving_count(&self) -> usize {
        self.capacity - self.idle_count()
    }
}

impl fmt::Debug for TierPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TierPool")
            .field("tier", &self.tier)
            .field("capacity", &self.capacity)
            .field("idle", &self.idle_count())
            .finish()
    }
}

/// Scoped handle to an acquired employee
///
/// Holds the employee away from its pool while a call is being served.
/// Dropping the guard releases the employee back to the pool it was acquired
/// from, whatever the exit path.
pub struct PooledEmployee {
    employee: Option<Employee>,
    pool: Arc<TierPool>,
}

impl PooledEmployee {
    /// The held employee
    pub fn employee(&self) -> &Employee {
        self.employee
            .as_ref()
            .expect("pooled employee accessed after release")
    }

    /// Identifier of the held employee
    pub fn id(&self) -> &EmployeeId {
        &self.employee().id
    }

    /// Tier of the held employee (always the pool's tier)
    pub fn tier(&self) -> Tier {
        self.employee().tier
    }
}

impl Drop for PooledEmployee {
    fn drop(&mut self) {
        if let Some(employee) = self.employee.take() {
            self.pool.release(employee);
        }
    }
}

impl fmt::Debug for PooledEmployee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledEmployee")
            .field("employee", &self.employee)
            .field("tier", &self.pool.tier())
            .finish()
    }
}
