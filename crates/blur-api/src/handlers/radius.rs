//! /radius handlers: read and change the filter radius.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use blur_core::Radius;

use super::ApiState;

#[derive(Serialize)]
pub struct RadiusResponse {
    pub radius: u32,
    pub max_radius: u32,
}

pub async fn handle_radius_get(State(state): State<ApiState>) -> Json<RadiusResponse> {
    Json(RadiusResponse {
        radius: state.radius.current().get(),
        max_radius: state.max_radius,
    })
}

#[derive(Deserialize)]
pub struct RadiusRequest {
    pub radius: u32,
}

/// Even values are bumped to the next odd one before the bound check.
pub async fn handle_radius_set(
    State(state): State<ApiState>,
    Json(req): Json<RadiusRequest>,
) -> Result<Json<RadiusResponse>, (StatusCode, String)> {
    let wanted = Radius::new(req.radius);
    if wanted.get() > state.max_radius {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("radius {} exceeds maximum {}", wanted, state.max_radius),
        ));
    }

    let stored = state.radius.set(req.radius);
    tracing::info!(radius = %stored, "radius changed via API");

    Ok(Json(RadiusResponse {
        radius: stored.get(),
        max_radius: state.max_radius,
    }))
}
