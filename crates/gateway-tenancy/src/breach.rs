//! The `Breach` entity (§3, §4.J): an SLA violation window with a severity
//! derived from how far the aggregate deviated from target, open until a
//! recovery observation closes it.

use chrono::{DateTime, Utc};

/// Opaque breach identifier.
pub type BreachId = String;

/// Severity of an SLA breach, derived from how far the offending aggregate
/// deviated from its target (as a ratio, not an absolute difference, so it
/// is comparable across metrics with different units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Deviation under 25% past target.
    Minor,
    /// Deviation 25-100% past target.
    Major,
    /// Deviation more than double the target.
    Critical,
}

impl Severity {
    /// Derive a severity from `deviation_ratio = |value - target| / target`.
    #[must_use]
    pub fn from_deviation_ratio(deviation_ratio: f64) -> Self {
        if deviation_ratio >= 1.0 {
            Self::Critical
        } else if deviation_ratio >= 0.25 {
            Self::Major
        } else {
            Self::Minor
        }
    }

    /// One severity level up, saturating at `Critical`. Used for
    /// time-based escalation of an unresolved breach.
    #[must_use]
    pub fn escalate(self) -> Self {
        match self {
            Self::Minor => Self::Major,
            Self::Major | Self::Critical => Self::Critical,
        }
    }
}

/// A single SLA violation window.
#[derive(Debug, Clone)]
pub struct Breach {
    /// Breach id, unique within the evaluator's lifetime.
    pub id: BreachId,
    /// The SLA that was violated.
    pub sla_id: String,
    /// The scope the violation was observed in (mirrors the SLA's scope).
    pub scope: String,
    /// The metric that triggered the breach.
    pub metric: String,
    /// Severity at the time the breach was opened (or last escalated).
    pub severity: Severity,
    /// The aggregate value that triggered the breach.
    pub observed_value: f64,
    /// When the breach opened.
    pub opened_at: DateTime<Utc>,
    /// When the breach was recovered, if it has been.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Breach {
    /// Whether this breach is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }

    /// Close the breach at the given time.
    pub fn resolve(&mut self, at: DateTime<Utc>) {
        self.resolved_at = Some(at);
    }
}
