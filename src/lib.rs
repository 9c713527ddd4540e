//! Hybrid incident triage engine: multi-strategy classification, SLA-aware
//! routing with escalation tracking, and a continuous learning loop with
//! gated model promotion.

pub mod api;
pub mod classification;
pub mod config;
pub mod error;
pub mod learning;
pub mod metrics;
pub mod ml;
pub mod models;
pub mod notifications;
pub mod routing;
pub mod scoring;
pub mod taxonomy;

pub use error::{Result, TriageError};
