//! HTTP surface: incident triage, feedback, metrics and admin operations.

pub mod handlers;
pub mod routes;

use crate::classification::CategoryManager;
use crate::config::Config;
use crate::learning::LearningPipeline;
use crate::routing::{AutoRouter, EscalationTracker, TeamLoadTracker};
use crate::taxonomy::TaxonomyStore;
use std::sync::Arc;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub taxonomy: Arc<TaxonomyStore>,
    pub manager: Arc<CategoryManager>,
    pub router: Arc<AutoRouter>,
    pub escalation: Arc<EscalationTracker>,
    pub load: Arc<TeamLoadTracker>,
    pub pipeline: Arc<LearningPipeline>,
}
