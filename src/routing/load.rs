use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// One utilization observation for a team
#[derive(Debug, Clone, Copy)]
struct LoadReading {
    utilization: f64,
    observed_at: DateTime<Utc>,
}

/// Last-known team utilization, fed by external load reports.
///
/// Readings are eventually consistent: routing keeps using a stale value
/// rather than blocking on a fresh one, and a team that has never reported
/// counts as idle.
#[derive(Default)]
pub struct TeamLoadTracker {
    readings: DashMap<String, LoadReading>,
}

impl TeamLoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a utilization reading in `[0, 1]`
    pub fn record(&self, team: impl Into<String>, utilization: f64) {
        self.readings.insert(
            team.into(),
            LoadReading {
                utilization: utilization.clamp(0.0, 1.0),
                observed_at: Utc::now(),
            },
        );
    }

    /// Current utilization for a team; 0.0 when it has never reported
    pub fn utilization(&self, team: &str) -> f64 {
        self.readings.get(team).map(|r| r.utilization).unwrap_or(0.0)
    }

    /// Whether the team's last reading is older than `tolerance_secs`
    pub fn is_stale(&self, team: &str, now: DateTime<Utc>, tolerance_secs: u64) -> bool {
        match self.readings.get(team) {
            Some(r) => now - r.observed_at > Duration::seconds(tolerance_secs as i64),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreported_team_is_idle() {
        let tracker = TeamLoadTracker::new();
        assert_eq!(tracker.utilization("platform-db"), 0.0);
        assert!(tracker.is_stale("platform-db", Utc::now(), 60));
    }

    #[test]
    fn test_record_and_read() {
        let tracker = TeamLoadTracker::new();
        tracker.record("platform-db", 0.85);

        assert_eq!(tracker.utilization("platform-db"), 0.85);
        assert!(!tracker.is_stale("platform-db", Utc::now(), 60));
    }

    #[test]
    fn test_readings_clamped() {
        let tracker = TeamLoadTracker::new();
        tracker.record("a", 1.7);
        tracker.record("b", -0.2);

        assert_eq!(tracker.utilization("a"), 1.0);
        assert_eq!(tracker.utilization("b"), 0.0);
    }
}
