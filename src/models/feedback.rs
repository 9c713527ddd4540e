use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A reviewer correction (or confirmation) of a classification.
///
/// Records are append-only: the pipeline consumes them but never mutates or
/// removes them.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FeedbackRecord {
    /// Incident the feedback refers to
    pub incident_id: Uuid,

    /// Category the engine originally chose
    #[validate(length(min = 1))]
    pub original_category: String,

    /// Category the reviewer says is correct
    #[validate(length(min = 1))]
    pub corrected_category: String,

    /// Reviewer identity
    #[validate(length(min = 1, max = 255))]
    pub submitted_by: String,

    /// Submission timestamp
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(
        incident_id: Uuid,
        original_category: String,
        corrected_category: String,
        submitted_by: String,
    ) -> Self {
        Self {
            incident_id,
            original_category,
            corrected_category,
            submitted_by,
            timestamp: Utc::now(),
        }
    }

    /// True when the reviewer confirmed the original classification
    pub fn is_confirmation(&self) -> bool {
        self.original_category == self.corrected_category
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_detection() {
        let confirmed = FeedbackRecord::new(
            Uuid::new_v4(),
            "application.batch".to_string(),
            "application.batch".to_string(),
            "reviewer@example.com".to_string(),
        );
        assert!(confirmed.is_confirmation());

        let corrected = FeedbackRecord::new(
            Uuid::new_v4(),
            "application.batch".to_string(),
            "infrastructure.database".to_string(),
            "reviewer@example.com".to_string(),
        );
        assert!(!corrected.is_confirmation());
    }
}
