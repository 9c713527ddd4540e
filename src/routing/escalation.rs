use crate::config::RoutingConfig;
use crate::error::{Result, TriageError};
use crate::metrics::ESCALATIONS_TOTAL;
use crate::models::{EscalationLevel, RoutingDecision};
use crate::notifications::{dispatch, EscalationEvent, NotificationSink};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// How long a resolved incident stays queryable before tick evicts it
const RESOLVED_RETENTION_SECS: i64 = 3600;

struct TrackedIncident {
    decision: RoutingDecision,
    escalation_chain: Vec<String>,
    /// Whether this incident ever escalated, so overrides don't undercount
    escalated: bool,
    resolved_at: Option<DateTime<Utc>>,
}

/// Drives the escalation state machine for active routing decisions.
///
/// `tick` evaluates the elapsed-time guards (0.8, 0.9, 1.0 of the assigned
/// SLA) and advances levels monotonically, notifying the responsible party
/// on each transition. Operator override and resolution are the only
/// non-time-driven transitions.
pub struct EscalationTracker {
    config: RoutingConfig,
    sink: Arc<dyn NotificationSink>,
    incidents: DashMap<Uuid, TrackedIncident>,

    routed_total: AtomicU64,
    escalated_total: AtomicU64,
    resolved_total: AtomicU64,
    resolved_in_sla: AtomicU64,
}

impl EscalationTracker {
    pub fn new(config: RoutingConfig, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            config,
            sink,
            incidents: DashMap::new(),
            routed_total: AtomicU64::new(0),
            escalated_total: AtomicU64::new(0),
            resolved_total: AtomicU64::new(0),
            resolved_in_sla: AtomicU64::new(0),
        }
    }

    /// Start tracking a fresh routing decision
    pub fn track(&self, decision: RoutingDecision, escalation_chain: Vec<String>) {
        self.routed_total.fetch_add(1, Ordering::Relaxed);
        self.incidents.insert(
            decision.incident_id,
            TrackedIncident {
                decision,
                escalation_chain,
                escalated: false,
                resolved_at: None,
            },
        );
    }

    pub fn decision(&self, incident_id: Uuid) -> Option<RoutingDecision> {
        self.incidents.get(&incident_id).map(|t| t.decision.clone())
    }

    /// Evaluate every active incident's guards at `now`, advancing levels
    /// and emitting notifications for each transition.
    pub async fn tick(&self, now: DateTime<Utc>) {
        let timeout = Duration::from_secs(self.config.notify_timeout_secs);
        let mut events = Vec::new();

        for mut entry in self.incidents.iter_mut() {
            let tracked = entry.value_mut();
            if !tracked.decision.is_active() {
                continue;
            }

            let elapsed = tracked.decision.sla_elapsed_fraction(now);

            // A late tick can cross several guards at once
            while let Some(next) = tracked.decision.escalation_level.next() {
                let due = match next.sla_fraction() {
                    Some(fraction) => elapsed >= fraction,
                    None => false,
                };
                if !due {
                    break;
                }

                tracked.decision.escalation_level = next;
                if !tracked.escalated {
                    tracked.escalated = true;
                    self.escalated_total.fetch_add(1, Ordering::Relaxed);
                }
                ESCALATIONS_TOTAL
                    .with_label_values(&[next.to_string().as_str()])
                    .inc();

                tracing::info!(
                    incident_id = %tracked.decision.incident_id,
                    level = %next,
                    elapsed_fraction = elapsed,
                    breach = next.is_breach(),
                    "Incident escalated"
                );

                events.push(self.event_for(tracked, next, now));
            }
        }

        // Resolved incidents stay queryable for a grace period, then drop
        // out so the map stays bounded; the rate counters are monotonic and
        // unaffected by eviction.
        self.incidents.retain(|_, tracked| match tracked.resolved_at {
            Some(at) => (now - at).num_seconds() <= RESOLVED_RETENTION_SECS,
            None => true,
        });

        // Deliver outside the map iteration so a slow sink never holds shards
        for event in events {
            dispatch(self.sink.as_ref(), event, timeout).await;
        }
    }

    /// Explicit resolution, reachable from any state
    pub async fn resolve(&self, incident_id: Uuid) -> Result<RoutingDecision> {
        let now = Utc::now();
        let (decision, chain) = {
            let mut entry = self
                .incidents
                .get_mut(&incident_id)
                .ok_or_else(|| TriageError::NotFound(format!("incident {}", incident_id)))?;

            let tracked = entry.value_mut();
            if !tracked.decision.is_active() {
                return Err(TriageError::Input("incident already resolved".to_string()));
            }

            if tracked.decision.sla_elapsed_fraction(now) <= 1.0 {
                self.resolved_in_sla.fetch_add(1, Ordering::Relaxed);
            }
            self.resolved_total.fetch_add(1, Ordering::Relaxed);

            tracked.decision.escalation_level = EscalationLevel::Resolved;
            tracked.resolved_at = Some(now);
            ESCALATIONS_TOTAL.with_label_values(&["resolved"]).inc();
            (tracked.decision.clone(), tracked.escalation_chain.clone())
        };

        let event = EscalationEvent {
            incident_id,
            team: decision.target_team.clone(),
            level: EscalationLevel::Resolved,
            responsible_party: chain.first().cloned().unwrap_or_else(|| decision.target_team.clone()),
            sla_minutes: decision.assigned_sla_minutes,
            occurred_at: now,
        };
        dispatch(
            self.sink.as_ref(),
            event,
            Duration::from_secs(self.config.notify_timeout_secs),
        )
        .await;

        Ok(decision)
    }

    /// Manual operator override. The one transition allowed to move
    /// backwards.
    pub fn override_level(&self, incident_id: Uuid, level: EscalationLevel) -> Result<()> {
        let mut entry = self
            .incidents
            .get_mut(&incident_id)
            .ok_or_else(|| TriageError::NotFound(format!("incident {}", incident_id)))?;

        let tracked = entry.value_mut();
        tracing::info!(
            incident_id = %incident_id,
            from = %tracked.decision.escalation_level,
            to = %level,
            "Escalation level overridden"
        );
        tracked.decision.escalation_level = level;
        match level {
            EscalationLevel::Assigned => {}
            EscalationLevel::Resolved => tracked.resolved_at = Some(Utc::now()),
            _ => {
                if !tracked.escalated {
                    tracked.escalated = true;
                    self.escalated_total.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        Ok(())
    }

    /// Fraction of resolved incidents that closed within their SLA
    pub fn sla_compliance(&self) -> f64 {
        let resolved = self.resolved_total.load(Ordering::Relaxed);
        if resolved == 0 {
            return 1.0;
        }
        self.resolved_in_sla.load(Ordering::Relaxed) as f64 / resolved as f64
    }

    /// Fraction of routed incidents that escalated at least once
    pub fn escalation_rate(&self) -> f64 {
        let routed = self.routed_total.load(Ordering::Relaxed);
        if routed == 0 {
            return 0.0;
        }
        self.escalated_total.load(Ordering::Relaxed) as f64 / routed as f64
    }

    fn event_for(
        &self,
        tracked: &TrackedIncident,
        level: EscalationLevel,
        now: DateTime<Utc>,
    ) -> EscalationEvent {
        // L1 pages the first chain entry, L2 the second, L3 the third;
        // short chains fall back to their last entry, empty ones to the team
        let index = match level {
            EscalationLevel::EscalatedL1 => 0,
            EscalationLevel::EscalatedL2 => 1,
            _ => 2,
        };
        let responsible_party = tracked
            .escalation_chain
            .get(index)
            .or_else(|| tracked.escalation_chain.last())
            .cloned()
            .unwrap_or_else(|| tracked.decision.target_team.clone());

        EscalationEvent {
            incident_id: tracked.decision.incident_id,
            team: tracked.decision.target_team.clone(),
            level,
            responsible_party,
            sla_minutes: tracked.decision.assigned_sla_minutes,
            occurred_at: now,
        }
    }
}
