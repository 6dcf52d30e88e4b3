//! /status and /daemon/shutdown handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use blur_services::StatsSnapshot;

use super::{audit_failure, ApiState};

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub radius: u32,
    pub bands: usize,
    pub listen_port: u16,
    pub work_dir: String,
    pub recorded_jobs: u64,
    pub jobs: StatsSnapshot,
}

pub async fn handle_status(
    State(state): State<ApiState>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let recorded_jobs = state.audit.count().map_err(audit_failure)?;

    Ok(Json(StatusResponse {
        radius: state.radius.current().get(),
        bands: state.bands,
        listen_port: state.listen_port,
        work_dir: state.work_dir.display().to_string(),
        recorded_jobs,
        jobs: state.stats.snapshot(),
    }))
}

// ── /daemon/shutdown ──────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ShutdownResponse {
    pub message: String,
}

pub async fn handle_shutdown(State(state): State<ApiState>) -> Json<ShutdownResponse> {
    tracing::info!("shutdown requested via API");
    let _ = state.shutdown_tx.send(());

    Json(ShutdownResponse {
        message: "Shutdown initiated".to_string(),
    })
}
