//! Core types for employees and escalation tiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Escalation tier enumeration
///
/// One priority level of employee. Calls walk the tiers in escalation order:
/// frontline first, then supervisor, then senior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    /// First tier: front-line operators
    Frontline,

    /// Second tier: supervisors
    Supervisor,

    /// Third tier: senior staff
    Senior,
}

impl Tier {
    /// All tiers in escalation order (tier 1 first)
    pub const CHAIN: [Tier; 3] = [Tier::Frontline, Tier::Supervisor, Tier::Senior];

    /// Stable lowercase name, also used as the employee id prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Frontline => "frontline",
            Tier::Supervisor => "supervisor",
            Tier::Senior => "senior",
        }
    }

    /// Position of this tier in the escalation chain (0-based)
    pub fn chain_index(&self) -> usize {
        match self {
            Tier::Frontline => 0,
            Tier::Supervisor => 1,
            Tier::Senior => 2,
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "frontline" | "Frontline" | "FRONTLINE" => Ok(Tier::Frontline),
            "supervisor" | "Supervisor" | "SUPERVISOR" => Ok(Tier::Supervisor),
            "senior" | "Senior" | "SENIOR" => Ok(Tier::Senior),
            _ => Err(format!("Unknown tier: {}", s)),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Employee identifier type for strongly-typed employee references
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmployeeId(pub String);

impl From<String> for EmployeeId {
    fn from(s: String) -> Self {
        EmployeeId(s)
    }
}

impl From<&str> for EmployeeId {
    fn from(s: &str) -> Self {
        EmployeeId(s.to_string())
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EmployeeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One employee of the call center
///
/// Created once at start-up as part of a tier roster and never destroyed;
/// after that an employee only moves between "idle in its tier pool" and
/// "serving a call".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Unique employee identifier, e.g. `frontline-3`
    pub id: EmployeeId,

    /// The tier this employee belongs to
    pub tier: Tier,
}

impl Employee {
    /// Create a new employee
    pub fn new(id: impl Into<EmployeeId>, tier: Tier) -> Self {
        Self { id: id.into(), tier }
    }
}

impl fmt::Display for Employee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Build the fixed roster for one tier
///
/// Ids follow the `<tier>-<n>` scheme, numbered from 1: `frontline-1`,
/// `frontline-2`, ...
pub fn build_roster(tier: Tier, count: usize) -> Vec<Employee> {
    (1..=count)
        .map(|n| Employee::new(format!("{}-{}", tier, n), tier))
        .collect()
}
