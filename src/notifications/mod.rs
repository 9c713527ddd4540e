//! Outbound notification seam for routing and escalation events.
//!
//! Delivery is fire-and-forget: the sink is awaited under a timeout and a
//! failure or timeout degrades to a warning, never to a failed escalation.

use crate::error::Result;
use crate::models::EscalationLevel;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// One routing or escalation event handed to the sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationEvent {
    pub incident_id: Uuid,

    /// Team owning the incident
    pub team: String,

    /// Level just entered
    pub level: EscalationLevel,

    /// Responsible party for this level, from the node's escalation chain
    pub responsible_party: String,

    /// Effective SLA of the routing decision (minutes)
    pub sla_minutes: u32,

    pub occurred_at: DateTime<Utc>,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &EscalationEvent) -> Result<()>;
}

/// Deliver an event under a timeout. Best-effort: any failure is logged
/// and swallowed.
pub async fn dispatch(sink: &dyn NotificationSink, event: EscalationEvent, timeout: Duration) {
    match tokio::time::timeout(timeout, sink.notify(&event)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(
                incident_id = %event.incident_id,
                level = %event.level,
                error = %e,
                "Notification delivery failed"
            );
        }
        Err(_) => {
            tracing::warn!(
                incident_id = %event.incident_id,
                level = %event.level,
                "Notification delivery timed out"
            );
        }
    }
}

/// Sink that emits events into the log stream. The default when no real
/// paging integration is configured.
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn notify(&self, event: &EscalationEvent) -> Result<()> {
        tracing::info!(
            incident_id = %event.incident_id,
            team = %event.team,
            level = %event.level,
            responsible_party = %event.responsible_party,
            sla_minutes = event.sla_minutes,
            "Escalation notification"
        );
        Ok(())
    }
}

/// Sink that forwards events over an unbounded channel, used by tests to
/// observe the notification stream.
pub struct ChannelSink {
    tx: tokio::sync::mpsc::UnboundedSender<EscalationEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<EscalationEvent>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn notify(&self, event: &EscalationEvent) -> Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| crate::error::TriageError::Internal("notification channel closed".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(level: EscalationLevel) -> EscalationEvent {
        EscalationEvent {
            incident_id: Uuid::new_v4(),
            team: "platform-db".to_string(),
            level,
            responsible_party: "dba-oncall".to_string(),
            sla_minutes: 20,
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new();
        dispatch(&sink, event(EscalationLevel::EscalatedL1), Duration::from_secs(1)).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.level, EscalationLevel::EscalatedL1);
        assert_eq!(received.responsible_party, "dba-oncall");
    }

    #[tokio::test]
    async fn test_dispatch_swallows_timeout() {
        struct StuckSink;

        #[async_trait]
        impl NotificationSink for StuckSink {
            async fn notify(&self, _event: &EscalationEvent) -> Result<()> {
                std::future::pending().await
            }
        }

        // Must return, not hang
        dispatch(
            &StuckSink,
            event(EscalationLevel::EscalatedL3),
            Duration::from_millis(10),
        )
        .await;
    }
}
