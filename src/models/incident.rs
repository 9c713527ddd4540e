use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

/// An operational incident report as received from the incident source.
///
/// Incidents are immutable once classified: reclassification produces a new
/// `ClassificationResult`, never a mutation of the incident itself.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Incident {
    /// Unique identifier
    pub id: Uuid,

    /// Human-readable title
    #[validate(length(min = 1, max = 500))]
    pub title: String,

    /// Detailed description
    pub description: String,

    /// Reported priority
    pub priority: Priority,

    /// Source system (e.g. "monitoring", "service-desk")
    #[validate(length(min = 1, max = 255))]
    pub source: String,

    /// Number of users affected
    pub affected_users: u64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Incident {
    /// Create a new incident
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        priority: Priority,
        source: impl Into<String>,
        affected_users: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            priority,
            source: source.into(),
            affected_users,
            created_at: Utc::now(),
        }
    }

    /// Combined title + description text used by all text-driven scorers
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }

    /// Content fingerprint used to absorb duplicate submissions.
    ///
    /// Covers everything classification depends on, deliberately excluding
    /// the id and creation time so resubmissions of identical content hit
    /// the cache.
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.title.as_bytes());
        hasher.update(self.description.as_bytes());
        hasher.update(self.source.as_bytes());
        hasher.update(self.priority.to_string().as_bytes());
        hasher.update(self.affected_users.to_le_bytes());

        format!("{:x}", hasher.finalize())
    }

    /// Whether the report came from an automated monitoring source
    pub fn is_automated(&self) -> bool {
        self.source.eq_ignore_ascii_case("monitoring")
            || self.source.eq_ignore_ascii_case("automated-monitoring")
    }
}

/// Incident priority as reported by the source
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// SLA multiplier for this priority
    pub fn sla_multiplier(&self) -> f64 {
        match self {
            Priority::Critical => 0.3,
            Priority::High => 0.5,
            Priority::Medium => 1.0,
            Priority::Low => 1.5,
        }
    }

    /// Whether this priority boosts keyword relevance
    pub fn is_urgent(&self) -> bool {
        matches!(self, Priority::Critical | Priority::High)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incident_creation() {
        let incident = Incident::new(
            "Database connection pool exhausted".to_string(),
            "Application servers report SQL timeouts".to_string(),
            Priority::High,
            "monitoring".to_string(),
            120,
        );

        assert_eq!(incident.priority, Priority::High);
        assert!(incident.is_automated());
        assert!(incident.text().contains("SQL timeouts"));
    }

    #[test]
    fn test_fingerprint_stable_across_resubmission() {
        let a = Incident::new(
            "Batch abend S0C7".to_string(),
            "Nightly cycle failed".to_string(),
            Priority::Critical,
            "scheduler".to_string(),
            0,
        );
        let mut b = a.clone();
        b.id = Uuid::new_v4();
        b.created_at = Utc::now();

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let a = Incident::new(
            "Login failures".to_string(),
            "Users cannot sign in".to_string(),
            Priority::Medium,
            "service-desk".to_string(),
            10,
        );
        let mut b = a.clone();
        b.description = "Different description".to_string();

        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_priority_multipliers() {
        assert_eq!(Priority::Critical.sla_multiplier(), 0.3);
        assert_eq!(Priority::High.sla_multiplier(), 0.5);
        assert_eq!(Priority::Medium.sla_multiplier(), 1.0);
        assert_eq!(Priority::Low.sla_multiplier(), 1.5);
        assert!(Priority::Critical.is_urgent());
        assert!(!Priority::Low.is_urgent());
    }
}
