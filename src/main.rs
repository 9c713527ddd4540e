use incident_triage::{
    api::{routes::build_router, AppState},
    classification::CategoryManager,
    config::Config,
    error::TriageError,
    learning::LearningPipeline,
    ml::{ActiveModel, FileModelStore, LabeledSample, ModelRegistry, ModelStore},
    notifications::TracingSink,
    routing::{AutoRouter, EscalationTracker, TeamLoadTracker},
    taxonomy::TaxonomyStore,
};
use chrono::Utc;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "incident_triage=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    }));

    tracing::info!("Starting incident triage engine v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = incident_triage::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        } else {
            tracing::info!("✅ Prometheus metrics initialized");
        }
    }

    // Load the taxonomy
    let taxonomy = Arc::new(TaxonomyStore::load(&config.taxonomy.path)?);
    tracing::info!(
        "✅ Taxonomy v{} loaded ({} categories)",
        taxonomy.version(),
        taxonomy.current().len()
    );

    // Load the model registry; a missing active model is fatal unless a
    // bootstrap sample set is provided to train the first one
    let store: Arc<dyn ModelStore> = Arc::new(FileModelStore::new(&config.model_store.path));
    let registry = match store.load().await? {
        Some(registry) => registry,
        None => bootstrap_registry(&config, store.as_ref()).await?,
    };

    let snapshot = registry.refit_active(config.learning.validation_split)?;
    tracing::info!(
        "✅ Active model {} loaded (accuracy {:.3}, {} samples)",
        snapshot.version.id,
        snapshot.version.held_out_accuracy,
        snapshot.version.n_training_samples
    );
    incident_triage::metrics::ACTIVE_MODEL_ACCURACY.set(snapshot.version.held_out_accuracy);
    let active = Arc::new(ActiveModel::new(snapshot));

    // Assemble the triage components
    let load = Arc::new(TeamLoadTracker::new());
    let manager = Arc::new(CategoryManager::new(
        config.classification.clone(),
        taxonomy.clone(),
        active.clone(),
    ));
    let router = Arc::new(AutoRouter::new(
        config.routing.clone(),
        taxonomy.clone(),
        load.clone(),
    ));
    let escalation = Arc::new(EscalationTracker::new(
        config.routing.clone(),
        Arc::new(TracingSink),
    ));
    let (pipeline, train_rx) = LearningPipeline::new(
        config.learning.clone(),
        active.clone(),
        store.clone(),
        escalation.clone(),
    );
    tracing::info!("✅ Triage components initialized");

    // Spawn the serialized training worker
    tokio::spawn(pipeline.clone().worker_loop(train_rx));
    tracing::info!("✅ Training worker started");

    // Spawn the escalation tick loop; interval retrains ride the same tick
    let tick_escalation = escalation.clone();
    let tick_pipeline = pipeline.clone();
    let tick_secs = config.routing.escalation_tick_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(tick_secs));
        loop {
            interval.tick().await;
            tick_escalation.tick(Utc::now()).await;
            tick_pipeline.evaluate_triggers(Utc::now());
        }
    });
    tracing::info!("✅ Escalation monitor started (every {}s)", tick_secs);

    let app_state = AppState {
        config: config.clone(),
        taxonomy,
        manager,
        router,
        escalation,
        load,
        pipeline,
    };
    let app = build_router(app_state);

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("🚀 HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Routing API: http://{}/v1/route", http_addr);

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Shutting down gracefully...");
    Ok(())
}

/// Train the first model from a bootstrap sample file. Without one, there
/// is no model to bind and serving classifications would be unsafe.
async fn bootstrap_registry(
    config: &Config,
    store: &dyn ModelStore,
) -> Result<ModelRegistry, TriageError> {
    let path = std::env::var("TRIAGE_BOOTSTRAP_SAMPLES").map_err(|_| {
        TriageError::ModelLoad(format!(
            "no model registry at {} and TRIAGE_BOOTSTRAP_SAMPLES is not set",
            config.model_store.path.display()
        ))
    })?;

    tracing::info!(path = %path, "Bootstrapping initial model from sample file");
    let raw = std::fs::read_to_string(&path)?;
    let samples: Vec<LabeledSample> = serde_json::from_str(&raw)?;

    let algorithm = config
        .learning
        .algorithm
        .parse()
        .unwrap_or_default();
    let trained = incident_triage::ml::train_candidate(
        &samples,
        algorithm,
        config.learning.validation_split,
        config.learning.min_training_samples,
    )?;

    let mut registry = ModelRegistry::default();
    let id = trained.version.id;
    registry.push(trained.version);
    registry.activate(id, samples)?;
    store.save(&registry).await?;

    tracing::info!(version = %id, "Initial model trained and persisted");
    Ok(registry)
}
