//! /jobs handler: recent audit rows.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use blur_services::StoredJob;

use super::{audit_failure, ApiState};

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 500;

#[derive(Deserialize)]
pub struct JobsQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct JobsResponse {
    pub total: u64,
    pub jobs: Vec<StoredJob>,
}

pub async fn handle_jobs(
    State(state): State<ApiState>,
    Query(query): Query<JobsQuery>,
) -> Result<Json<JobsResponse>, (StatusCode, String)> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let jobs = state.audit.recent(limit).map_err(audit_failure)?;
    let total = state.audit.count().map_err(audit_failure)?;

    Ok(Json(JobsResponse { total, jobs }))
}
