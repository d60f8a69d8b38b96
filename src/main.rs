use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;

use flow_progress::config::{EngineConfig, FlowConfigSource};
use flow_progress::flow::{FlowEngine, flow_routes};
use flow_progress::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = EngineConfig::from_env().context("invalid FLOW_* configuration")?;

    eprintln!("Flow Progress v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Store: {} (starts at {})", config.store_name, config.default_step);
    eprintln!(
        "   Verification: otp={} camera={}",
        config.flow.requires_otp, config.flow.requires_camera
    );
    eprintln!("   API: http://0.0.0.0:{}/api/flow/status", config.port);

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("failed to open database at {}", config.db_path.display()))?,
    );

    // ── Flow engine ──────────────────────────────────────────────────────
    let config_source = Arc::new(FlowConfigSource::new(config.flow));
    let engine = FlowEngine::new(Arc::clone(&db), config_source.subscribe());

    let stored = engine.persisted_sessions().await;
    if !stored.is_empty() {
        tracing::info!(stores = ?stored, "Persisted flow sessions found");
    }

    let store = engine
        .resume_store(config.default_step, &config.store_name)
        .await;
    let app = flow_routes(Arc::new(Mutex::new(store)), config_source);

    // ── HTTP ─────────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Flow API server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server error")?;

    engine.flush().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
