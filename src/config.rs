use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,

    /// Taxonomy configuration source
    pub taxonomy: TaxonomyFileConfig,

    /// Hybrid classification configuration
    pub classification: ClassificationConfig,

    /// Routing / SLA configuration
    pub routing: RoutingConfig,

    /// Continuous learning configuration
    pub learning: LearningConfig,

    /// Model store configuration
    pub model_store: ModelStoreConfig,
}

impl Config {
    /// Load configuration from embedded defaults, optional file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/triage.toml".to_string());

        config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::with_name(&config_path).required(false))
            .add_source(
                config::Environment::with_prefix("TRIAGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            observability: ObservabilityConfig::default(),
            taxonomy: TaxonomyFileConfig::default(),
            classification: ClassificationConfig::default(),
            routing: RoutingConfig::default(),
            learning: LearningConfig::default(),
            model_store: ModelStoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub json_logs: bool,

    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: true,
            service_name: default_service_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyFileConfig {
    /// Path to the taxonomy YAML file
    #[serde(default = "default_taxonomy_path")]
    pub path: PathBuf,
}

impl Default for TaxonomyFileConfig {
    fn default() -> Self {
        Self {
            path: default_taxonomy_path(),
        }
    }
}

/// Configuration for the hybrid classification engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Fusion weight for the ML scorer
    #[serde(default = "default_ml_weight")]
    pub ml_weight: f64,

    /// Fusion weight for the NLP scorer
    #[serde(default = "default_nlp_weight")]
    pub nlp_weight: f64,

    /// Fusion weight for the keyword scorer
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,

    /// Fusion weight for the pattern scorer
    #[serde(default = "default_pattern_weight")]
    pub pattern_weight: f64,

    /// Per-extra-method confidence bonus
    #[serde(default = "default_diversity_bonus")]
    pub diversity_bonus: f64,

    /// Minimum combined score to accept the top candidate
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Number of candidates retained in the result
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Category used when confidence is below the threshold
    #[serde(default = "default_fallback_category")]
    pub fallback_category: String,

    /// Result cache capacity (entries)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,

    /// Result cache TTL (seconds)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            ml_weight: default_ml_weight(),
            nlp_weight: default_nlp_weight(),
            keyword_weight: default_keyword_weight(),
            pattern_weight: default_pattern_weight(),
            diversity_bonus: default_diversity_bonus(),
            min_confidence: default_min_confidence(),
            top_k: default_top_k(),
            fallback_category: default_fallback_category(),
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

/// Configuration for the SLA-aware router
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Absolute SLA floor (minutes)
    #[serde(default = "default_min_sla")]
    pub min_sla_minutes: u32,

    /// Affected-user count above which the impact multiplier applies
    #[serde(default = "default_large_impact")]
    pub large_impact_threshold: u64,

    /// Utilization above which a team is not assignable
    #[serde(default = "default_utilization_limit")]
    pub utilization_limit: f64,

    /// Utilization above which the load multiplier applies
    #[serde(default = "default_high_load")]
    pub high_load_threshold: f64,

    /// Staleness tolerance for team load readings (seconds)
    #[serde(default = "default_load_refresh")]
    pub load_refresh_secs: u64,

    /// Team that absorbs incidents when everyone is at capacity
    #[serde(default = "default_overflow_team")]
    pub overflow_team: String,

    /// Escalation evaluation cadence (seconds)
    #[serde(default = "default_escalation_tick")]
    pub escalation_tick_secs: u64,

    /// Timeout for notification delivery (seconds)
    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            min_sla_minutes: default_min_sla(),
            large_impact_threshold: default_large_impact(),
            utilization_limit: default_utilization_limit(),
            high_load_threshold: default_high_load(),
            load_refresh_secs: default_load_refresh(),
            overflow_team: default_overflow_team(),
            escalation_tick_secs: default_escalation_tick(),
            notify_timeout_secs: default_notify_timeout(),
        }
    }
}

/// Configuration for the continuous learning pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Minimum labeled samples required to start a training job
    #[serde(default = "default_min_training_samples")]
    pub min_training_samples: usize,

    /// Unprocessed feedback count that fires the retrain trigger
    #[serde(default = "default_feedback_threshold")]
    pub feedback_retrain_threshold: usize,

    /// Rolling accuracy window size (feedback records)
    #[serde(default = "default_accuracy_window")]
    pub accuracy_window: usize,

    /// Trailing accuracy below which degradation is signalled
    #[serde(default = "default_degradation_threshold")]
    pub degradation_threshold: f64,

    /// Fixed retrain interval (seconds)
    #[serde(default = "default_retrain_interval")]
    pub retrain_interval_secs: u64,

    /// Held-out fraction used for validation
    #[serde(default = "default_validation_split")]
    pub validation_split: f64,

    /// Allowed accuracy regression when promoting a candidate
    #[serde(default = "default_regression_tolerance")]
    pub regression_tolerance: f64,

    /// Absolute accuracy that always qualifies a non-regressing candidate
    #[serde(default = "default_promotion_floor")]
    pub promotion_floor: f64,

    /// Training algorithm
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            min_training_samples: default_min_training_samples(),
            feedback_retrain_threshold: default_feedback_threshold(),
            accuracy_window: default_accuracy_window(),
            degradation_threshold: default_degradation_threshold(),
            retrain_interval_secs: default_retrain_interval(),
            validation_split: default_validation_split(),
            regression_tolerance: default_regression_tolerance(),
            promotion_floor: default_promotion_floor(),
            algorithm: default_algorithm(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStoreConfig {
    /// Directory holding the model registry
    #[serde(default = "default_model_path")]
    pub path: PathBuf,
}

impl Default for ModelStoreConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "incident-triage".to_string()
}

fn default_true() -> bool {
    true
}

fn default_taxonomy_path() -> PathBuf {
    PathBuf::from("config/taxonomy.yaml")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("data/models")
}

fn default_ml_weight() -> f64 {
    0.4
}

fn default_nlp_weight() -> f64 {
    0.3
}

fn default_keyword_weight() -> f64 {
    0.2
}

fn default_pattern_weight() -> f64 {
    0.1
}

fn default_diversity_bonus() -> f64 {
    0.1
}

fn default_min_confidence() -> f64 {
    0.6
}

fn default_top_k() -> usize {
    5
}

fn default_fallback_category() -> String {
    "general.unclassified".to_string()
}

fn default_cache_capacity() -> u64 {
    1000
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_min_sla() -> u32 {
    5
}

fn default_large_impact() -> u64 {
    500
}

fn default_utilization_limit() -> f64 {
    0.9
}

fn default_high_load() -> f64 {
    0.8
}

fn default_load_refresh() -> u64 {
    60
}

fn default_overflow_team() -> String {
    "overflow".to_string()
}

fn default_escalation_tick() -> u64 {
    30
}

fn default_notify_timeout() -> u64 {
    5
}

fn default_min_training_samples() -> usize {
    100
}

fn default_feedback_threshold() -> usize {
    50
}

fn default_accuracy_window() -> usize {
    100
}

fn default_degradation_threshold() -> f64 {
    0.85
}

fn default_retrain_interval() -> u64 {
    86400
}

fn default_validation_split() -> f64 {
    0.2
}

fn default_regression_tolerance() -> f64 {
    0.02
}

fn default_promotion_floor() -> f64 {
    0.85
}

fn default_algorithm() -> String {
    "logistic_regression".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.classification.min_confidence, 0.6);
        assert_eq!(config.classification.top_k, 5);
        assert_eq!(config.routing.min_sla_minutes, 5);
        assert_eq!(config.learning.min_training_samples, 100);
        assert_eq!(config.learning.feedback_retrain_threshold, 50);
    }

    #[test]
    fn test_fusion_weights_sum_to_one() {
        let c = ClassificationConfig::default();
        let sum = c.ml_weight + c.nlp_weight + c.keyword_weight + c.pattern_weight;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_embedded_defaults_parse() {
        let parsed: toml::Value = include_str!("../config/default.toml")
            .parse()
            .expect("embedded defaults must be valid TOML");
        assert!(parsed.get("classification").is_some());
        assert!(parsed.get("routing").is_some());
        assert!(parsed.get("learning").is_some());
    }
}
