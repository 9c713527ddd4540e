use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Escalation progress of a routed incident.
///
/// Ordering matters: transitions are monotonic non-decreasing except for an
/// explicit operator override, and `Resolved` is reachable from every state.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumString,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EscalationLevel {
    Assigned,
    EscalatedL1,
    EscalatedL2,
    EscalatedL3,
    Resolved,
}

impl EscalationLevel {
    /// Fraction of the assigned SLA at which this level is entered.
    /// `None` for levels not driven by elapsed time.
    pub fn sla_fraction(&self) -> Option<f64> {
        match self {
            EscalationLevel::Assigned => None,
            EscalationLevel::EscalatedL1 => Some(0.8),
            EscalationLevel::EscalatedL2 => Some(0.9),
            EscalationLevel::EscalatedL3 => Some(1.0),
            EscalationLevel::Resolved => None,
        }
    }

    /// The next time-driven level, if any
    pub fn next(&self) -> Option<EscalationLevel> {
        match self {
            EscalationLevel::Assigned => Some(EscalationLevel::EscalatedL1),
            EscalationLevel::EscalatedL1 => Some(EscalationLevel::EscalatedL2),
            EscalationLevel::EscalatedL2 => Some(EscalationLevel::EscalatedL3),
            EscalationLevel::EscalatedL3 | EscalationLevel::Resolved => None,
        }
    }

    /// L3 marks the SLA breach
    pub fn is_breach(&self) -> bool {
        matches!(self, EscalationLevel::EscalatedL3)
    }
}

/// The routing outcome for one classified incident. Only the escalation
/// level mutates after assignment; everything else is fixed at routing time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Incident this decision belongs to
    pub incident_id: Uuid,

    /// Team the incident was assigned to
    pub target_team: String,

    /// Effective SLA in minutes after all multipliers and the floor
    pub assigned_sla_minutes: u32,

    /// Current escalation level
    pub escalation_level: EscalationLevel,

    /// True when the incident landed on the overflow team because the
    /// primary and all alternates were at capacity
    pub overflowed: bool,

    /// When the assignment was made; escalation guards are relative to this
    pub assigned_at: DateTime<Utc>,
}

impl RoutingDecision {
    /// Elapsed fraction of the assigned SLA at `now`
    pub fn sla_elapsed_fraction(&self, now: DateTime<Utc>) -> f64 {
        if self.assigned_sla_minutes == 0 {
            return 1.0;
        }
        let elapsed = (now - self.assigned_at).num_seconds() as f64;
        elapsed / (self.assigned_sla_minutes as f64 * 60.0)
    }

    /// Whether the decision is still in an active (unresolved) state
    pub fn is_active(&self) -> bool {
        self.escalation_level != EscalationLevel::Resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_escalation_level_ordering() {
        assert!(EscalationLevel::Assigned < EscalationLevel::EscalatedL1);
        assert!(EscalationLevel::EscalatedL1 < EscalationLevel::EscalatedL2);
        assert!(EscalationLevel::EscalatedL2 < EscalationLevel::EscalatedL3);
        assert!(EscalationLevel::EscalatedL3 < EscalationLevel::Resolved);
    }

    #[test]
    fn test_level_progression() {
        assert_eq!(
            EscalationLevel::Assigned.next(),
            Some(EscalationLevel::EscalatedL1)
        );
        assert_eq!(EscalationLevel::EscalatedL3.next(), None);
        assert_eq!(EscalationLevel::Resolved.next(), None);
        assert!(EscalationLevel::EscalatedL3.is_breach());
        assert!(!EscalationLevel::EscalatedL1.is_breach());
    }

    #[test]
    fn test_sla_fractions() {
        assert_eq!(EscalationLevel::EscalatedL1.sla_fraction(), Some(0.8));
        assert_eq!(EscalationLevel::EscalatedL2.sla_fraction(), Some(0.9));
        assert_eq!(EscalationLevel::EscalatedL3.sla_fraction(), Some(1.0));
        assert_eq!(EscalationLevel::Assigned.sla_fraction(), None);
    }

    #[test]
    fn test_elapsed_fraction() {
        let assigned_at = Utc::now() - Duration::minutes(10);
        let decision = RoutingDecision {
            incident_id: Uuid::new_v4(),
            target_team: "app-support".to_string(),
            assigned_sla_minutes: 20,
            escalation_level: EscalationLevel::Assigned,
            overflowed: false,
            assigned_at,
        };

        let fraction = decision.sla_elapsed_fraction(Utc::now());
        assert!(fraction > 0.49 && fraction < 0.51);
        assert!(decision.is_active());
    }
}
