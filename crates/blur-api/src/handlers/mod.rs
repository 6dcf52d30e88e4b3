//! HTTP API handlers — exposes daemon state as JSON.

pub mod jobs;
pub mod radius;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;

use blur_core::RadiusCell;
use blur_services::{AuditError, AuditLog, ServerStats};

#[derive(Clone)]
pub struct ApiState {
    /// Radius the next job will read.
    pub radius: RadiusCell,
    /// Largest radius `POST /radius` accepts.
    pub max_radius: u32,
    pub audit: Arc<AuditLog>,
    pub stats: ServerStats,
    /// Parallel bands per image.
    pub bands: usize,
    /// Port of the image socket.
    pub listen_port: u16,
    pub work_dir: PathBuf,
    /// Signals graceful daemon shutdown.
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

// ── Shared helpers ────────────────────────────────────────────────────────────

fn audit_failure(e: AuditError) -> (StatusCode, String) {
    tracing::warn!(error = %e, "audit query failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[cfg(test)]
pub(crate) fn test_state(max_radius: u32) -> ApiState {
    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    ApiState {
        radius: RadiusCell::default(),
        max_radius,
        audit: Arc::new(AuditLog::open_in_memory().unwrap()),
        stats: ServerStats::new(),
        bands: 4,
        listen_port: 5000,
        work_dir: PathBuf::from("/tmp/blurd-test"),
        shutdown_tx,
    }
}

// Re-export handler functions for use in router setup.
pub use jobs::handle_jobs;
pub use radius::{handle_radius_get, handle_radius_set};
pub use status::{handle_shutdown, handle_status};
