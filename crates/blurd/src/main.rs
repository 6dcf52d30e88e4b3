//! blurd — networked box-blur daemon.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};

use blur_core::config::BlurConfig;
use blur_core::RadiusCell;
use blur_services::{server, AuditLog, BoxBlur, Pipeline, Server, ServerStats, WorkDir};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = BlurConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = BlurConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        BlurConfig::default()
    });

    // ── Collaborators ────────────────────────────────────────────────────────

    let work_dir = WorkDir::new(&config.storage.work_dir).context("failed to prepare work dir")?;
    let audit = Arc::new(
        AuditLog::open(&config.storage.database).context("failed to open audit database")?,
    );
    let bands = config.filter.effective_workers();
    let engine = Arc::new(BoxBlur::new(bands).context("failed to start blur workers")?);
    let radius = RadiusCell::new(config.filter.initial());
    let stats = ServerStats::new();

    tracing::info!(
        work_dir = %work_dir.root().display(),
        database = %config.storage.database.display(),
        bands,
        radius = %radius.current(),
        "blurd starting"
    );

    let pipeline = Pipeline::new(
        Arc::new(radius.clone()),
        audit.clone(),
        engine,
        work_dir.clone(),
        config.transfer.limits(),
        stats.clone(),
    );

    // Bind failure is fatal.
    let listen = SocketAddr::new(config.network.listen_addr, config.network.port);
    let listener = server::bind(listen).await?;
    let listen_port = listener.local_addr()?.port();

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // Control API
    let api_port = config.network.api_port;
    if api_port != 0 {
        let state = blur_api::ApiState {
            radius: radius.clone(),
            max_radius: config.filter.max_radius,
            audit: audit.clone(),
            stats: stats.clone(),
            bands,
            listen_port,
            work_dir: work_dir.root().to_path_buf(),
            shutdown_tx: shutdown_tx.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = blur_api::serve(state, api_port).await {
                tracing::error!(error = %e, "control API failed");
            }
        });
    } else {
        tracing::info!("control API disabled");
    }

    // ── Serve until shutdown ─────────────────────────────────────────────────

    Server::new(listener, pipeline, shutdown_tx.subscribe())
        .run()
        .await?;

    let snap = stats.snapshot();
    tracing::info!(
        completed = snap.completed,
        aborted = snap.aborted,
        "blurd stopped"
    );
    Ok(())
}
