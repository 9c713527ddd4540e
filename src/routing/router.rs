use crate::config::RoutingConfig;
use crate::metrics::ROUTING_DECISIONS_TOTAL;
use crate::models::{ClassificationResult, EscalationLevel, Incident, RoutingDecision};
use crate::routing::TeamLoadTracker;
use crate::taxonomy::{TaxonomyNode, TaxonomyStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Load multiplier applied above the high-load threshold
const LOAD_MULTIPLIER: f64 = 1.2;

/// SLA multiplier outside the target team's business hours
const AFTER_HOURS_MULTIPLIER: f64 = 1.5;

/// SLA multiplier for incidents over the large-impact threshold
const LARGE_IMPACT_MULTIPLIER: f64 = 0.7;

/// Assigns classified incidents to teams with an effective SLA.
///
/// Routing is total: when the primary team and every declared alternate is
/// at capacity (or unreachable after hours), the incident lands on the
/// overflow team with `overflowed` set rather than failing.
pub struct AutoRouter {
    config: RoutingConfig,
    taxonomy: Arc<TaxonomyStore>,
    load: Arc<TeamLoadTracker>,
}

impl AutoRouter {
    pub fn new(
        config: RoutingConfig,
        taxonomy: Arc<TaxonomyStore>,
        load: Arc<TeamLoadTracker>,
    ) -> Self {
        Self {
            config,
            taxonomy,
            load,
        }
    }

    pub fn route(
        &self,
        incident: &Incident,
        classification: &ClassificationResult,
    ) -> RoutingDecision {
        self.route_at(incident, classification, Utc::now())
    }

    /// Route with an explicit clock, for guard-boundary tests
    pub fn route_at(
        &self,
        incident: &Incident,
        classification: &ClassificationResult,
        now: DateTime<Utc>,
    ) -> RoutingDecision {
        let taxonomy = self.taxonomy.current();

        let node = taxonomy
            .node(&classification.chosen_category)
            .or_else(|| taxonomy.node(&taxonomy.fallback_category));

        let (target_team, overflowed, base_sla) = match node {
            Some(node) => {
                let base_sla = node.base_sla_minutes;
                match self.pick_team(node, &taxonomy, now) {
                    Some(team) => (team, false, base_sla),
                    None => (self.config.overflow_team.clone(), true, base_sla),
                }
            }
            // Taxonomy without a usable node at all: overflow absorbs it
            None => (self.config.overflow_team.clone(), true, 60),
        };

        let sla = self.effective_sla(incident, &target_team, base_sla, now, &taxonomy);

        ROUTING_DECISIONS_TOTAL
            .with_label_values(&[if overflowed { "true" } else { "false" }])
            .inc();

        tracing::info!(
            incident_id = %incident.id,
            category = %classification.chosen_category,
            team = %target_team,
            sla_minutes = sla,
            overflowed,
            "Incident routed"
        );

        RoutingDecision {
            incident_id: incident.id,
            target_team,
            assigned_sla_minutes: sla,
            escalation_level: EscalationLevel::Assigned,
            overflowed,
            assigned_at: now,
        }
    }

    /// First assignable team among the node's own team and its declared
    /// alternates, in declaration order
    fn pick_team(
        &self,
        node: &TaxonomyNode,
        taxonomy: &crate::taxonomy::TaxonomySnapshot,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let candidates = std::iter::once(node.team.as_str()).chain(
            node.related
                .iter()
                .filter_map(|alt| taxonomy.node(alt))
                .map(|alt| alt.team.as_str()),
        );

        for team_name in candidates {
            let Some(team) = taxonomy.team(team_name) else {
                continue;
            };

            if self.load.is_stale(team_name, now, self.config.load_refresh_secs) {
                tracing::debug!(team = team_name, "Using stale or missing load reading");
            }
            if self.load.utilization(team_name) > self.config.utilization_limit {
                continue;
            }
            if !team.is_business_hours(now) && !team.supports_24x7 {
                continue;
            }

            return Some(team_name.to_string());
        }

        None
    }

    /// SLA multipliers, evaluated against the same snapshot the routing
    /// walk used so a mid-decision reload cannot mix taxonomy versions
    fn effective_sla(
        &self,
        incident: &Incident,
        target_team: &str,
        base_sla_minutes: u32,
        now: DateTime<Utc>,
        taxonomy: &crate::taxonomy::TaxonomySnapshot,
    ) -> u32 {
        let business_hours = taxonomy
            .team(target_team)
            .map(|t| t.is_business_hours(now))
            .unwrap_or(true);
        let hours_mult = if business_hours {
            1.0
        } else {
            AFTER_HOURS_MULTIPLIER
        };

        let load_mult = if self.load.utilization(target_team) > self.config.high_load_threshold {
            LOAD_MULTIPLIER
        } else {
            1.0
        };

        let impact_mult = if incident.affected_users > self.config.large_impact_threshold {
            LARGE_IMPACT_MULTIPLIER
        } else {
            1.0
        };

        let sla = base_sla_minutes as f64
            * incident.priority.sla_multiplier()
            * hours_mult
            * load_mult
            * impact_mult;

        (sla.round() as u32).max(self.config.min_sla_minutes)
    }
}
