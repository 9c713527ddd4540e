//! Versioned category taxonomy with routing metadata.
//!
//! The taxonomy is loaded from YAML into an immutable compiled snapshot
//! (regexes compiled, team references validated). `reload` swaps the
//! snapshot atomically, so in-flight classification and routing keep the
//! snapshot they started with.

use crate::error::{Result, TriageError};
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A team that can own incidents
#[derive(Debug, Clone)]
pub struct Team {
    pub name: String,
    pub timezone: Tz,
    pub business_hours_start: u32,
    pub business_hours_end: u32,
    pub supports_24x7: bool,
}

impl Team {
    /// Whether `now` falls inside this team's business hours
    pub fn is_business_hours(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.timezone);
        let hour = local.hour();
        hour >= self.business_hours_start && hour < self.business_hours_end
    }
}

/// One category with its routing metadata and scorer dictionaries
#[derive(Debug)]
pub struct TaxonomyNode {
    pub id: String,
    pub name: String,
    pub team: String,
    pub escalation_chain: Vec<String>,
    pub base_sla_minutes: u32,
    pub priority_weight: f64,
    /// Alternate nodes considered, in order, when the primary team is at
    /// capacity
    pub related: Vec<String>,
    pub keywords: Vec<String>,
    pub patterns: Vec<Regex>,
    pub concepts: HashSet<String>,
}

/// An immutable compiled taxonomy
#[derive(Debug)]
pub struct TaxonomySnapshot {
    pub version: u64,
    pub fallback_category: String,
    nodes: HashMap<String, TaxonomyNode>,
    node_order: Vec<String>,
    teams: HashMap<String, Team>,
}

impl TaxonomySnapshot {
    pub fn node(&self, id: &str) -> Option<&TaxonomyNode> {
        self.nodes.get(id)
    }

    /// Nodes in stable (declaration) order
    pub fn nodes(&self) -> impl Iterator<Item = &TaxonomyNode> {
        self.node_order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.node_order.clone()
    }

    pub fn team(&self, name: &str) -> Option<&Team> {
        self.teams.get(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Hot-reloadable taxonomy store
pub struct TaxonomyStore {
    snapshot: RwLock<Arc<TaxonomySnapshot>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for TaxonomyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaxonomyStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl TaxonomyStore {
    /// Load the taxonomy from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = std::fs::read_to_string(&path)?;
        let snapshot = compile(&raw)?;

        tracing::info!(
            path = %path.display(),
            version = snapshot.version,
            nodes = snapshot.len(),
            "Taxonomy loaded"
        );

        Ok(Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            path: Some(path),
        })
    }

    /// Build a store directly from YAML text (no backing file, not reloadable)
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let snapshot = compile(raw)?;
        Ok(Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            path: None,
        })
    }

    /// Re-read the backing file and swap the snapshot. In-flight readers
    /// keep the snapshot they already bound.
    pub fn reload(&self) -> Result<u64> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| TriageError::Configuration("taxonomy has no backing file".into()))?;
        let raw = std::fs::read_to_string(path)?;
        let snapshot = compile(&raw)?;
        let version = snapshot.version;

        *self.snapshot.write() = Arc::new(snapshot);
        tracing::info!(version, "Taxonomy reloaded");
        Ok(version)
    }

    /// Bind to the current snapshot
    pub fn current(&self) -> Arc<TaxonomySnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    pub fn version(&self) -> u64 {
        self.snapshot.read().version
    }
}

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    version: u64,
    teams: Vec<TeamSpec>,
    fallback_category: String,
    nodes: Vec<NodeSpec>,
}

#[derive(Debug, Deserialize)]
struct TeamSpec {
    name: String,
    timezone: String,
    business_hours: HoursSpec,
    #[serde(default)]
    supports_24x7: bool,
}

#[derive(Debug, Deserialize)]
struct HoursSpec {
    start: u32,
    end: u32,
}

#[derive(Debug, Deserialize)]
struct NodeSpec {
    id: String,
    name: String,
    team: String,
    #[serde(default)]
    escalation_chain: Vec<String>,
    base_sla_minutes: u32,
    #[serde(default)]
    priority_weight: f64,
    #[serde(default)]
    related: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default)]
    concepts: Vec<String>,
}

fn compile(raw: &str) -> Result<TaxonomySnapshot> {
    let file: TaxonomyFile = serde_yaml::from_str(raw)?;

    let mut teams = HashMap::new();
    for spec in file.teams {
        let tz: Tz = spec.timezone.parse().map_err(|_| {
            TriageError::Configuration(format!(
                "team '{}' has unknown timezone '{}'",
                spec.name, spec.timezone
            ))
        })?;
        if spec.business_hours.end > 24 || spec.business_hours.start >= spec.business_hours.end {
            return Err(TriageError::Configuration(format!(
                "team '{}' has invalid business hours {}..{}",
                spec.name, spec.business_hours.start, spec.business_hours.end
            )));
        }
        teams.insert(
            spec.name.clone(),
            Team {
                name: spec.name,
                timezone: tz,
                business_hours_start: spec.business_hours.start,
                business_hours_end: spec.business_hours.end,
                supports_24x7: spec.supports_24x7,
            },
        );
    }

    let mut nodes = HashMap::new();
    let mut node_order = Vec::new();
    for spec in file.nodes {
        if !teams.contains_key(&spec.team) {
            return Err(TriageError::Configuration(format!(
                "node '{}' references unknown team '{}'",
                spec.id, spec.team
            )));
        }

        let mut patterns = Vec::with_capacity(spec.patterns.len());
        for source in &spec.patterns {
            let regex = Regex::new(source).map_err(|e| {
                TriageError::Configuration(format!(
                    "node '{}' has invalid pattern '{}': {}",
                    spec.id, source, e
                ))
            })?;
            patterns.push(regex);
        }

        node_order.push(spec.id.clone());
        nodes.insert(
            spec.id.clone(),
            TaxonomyNode {
                id: spec.id,
                name: spec.name,
                team: spec.team,
                escalation_chain: spec.escalation_chain,
                base_sla_minutes: spec.base_sla_minutes,
                priority_weight: spec.priority_weight,
                related: spec.related,
                keywords: spec.keywords.into_iter().map(|k| k.to_lowercase()).collect(),
                patterns,
                concepts: spec.concepts.into_iter().map(|c| c.to_lowercase()).collect(),
            },
        );
    }

    if !nodes.contains_key(&file.fallback_category) {
        return Err(TriageError::Configuration(format!(
            "fallback category '{}' is not a taxonomy node",
            file.fallback_category
        )));
    }

    // Alternates must resolve
    for node in nodes.values() {
        for alt in &node.related {
            if !nodes.contains_key(alt) {
                return Err(TriageError::Configuration(format!(
                    "node '{}' references unknown alternate '{}'",
                    node.id, alt
                )));
            }
        }
    }

    Ok(TaxonomySnapshot {
        version: file.version,
        fallback_category: file.fallback_category,
        nodes,
        node_order,
        teams,
    })
}

#[cfg(test)]
pub(crate) fn test_taxonomy_yaml() -> &'static str {
    r#"
version: 7
teams:
  - name: platform-db
    timezone: "UTC"
    business_hours: { start: 8, end: 18 }
    supports_24x7: true
  - name: app-support
    timezone: "UTC"
    business_hours: { start: 9, end: 17 }
    supports_24x7: false
  - name: overflow
    timezone: "UTC"
    business_hours: { start: 0, end: 24 }
    supports_24x7: true
fallback_category: general.unclassified
nodes:
  - id: infrastructure.database
    name: Database Infrastructure
    team: platform-db
    escalation_chain: [dba-oncall, dba-lead]
    base_sla_minutes: 60
    priority_weight: 0.9
    related: [application.batch]
    keywords: [database, deadlock, connection, timeout]
    patterns: ['(?i)\bSQL\d{3,5}[NC]?\b', '(?i)\bORA-\d{5}\b']
    concepts: [database, connection, deadlock, query]
  - id: application.batch
    name: Batch Processing
    team: app-support
    escalation_chain: [batch-oncall]
    base_sla_minutes: 45
    priority_weight: 0.8
    related: []
    keywords: [batch, job, abend, scheduler]
    patterns: ['(?i)\bS0C[1-7B]\b', '(?i)\bU\d{4}\b']
    concepts: [batch, job, abend, schedule]
  - id: general.unclassified
    name: General
    team: overflow
    escalation_chain: [triage-desk]
    base_sla_minutes: 240
    priority_weight: 0.1
    related: []
    keywords: []
    patterns: []
    concepts: []
"#
}
