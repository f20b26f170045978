//! Round inspection endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::RoundId;
use domain::{Round, Spin};
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct RoundResponse {
    pub round: Round,
    pub spins: Vec<Spin>,
}

/// GET /rounds/{id} — a round with its spins, oldest first.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RoundResponse>, ApiError> {
    let uuid = uuid::Uuid::parse_str(&id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;

    let (round, spins) = state
        .coordinator
        .round_with_spins(RoundId::from_uuid(uuid))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Round {id} not found")))?;

    Ok(Json(RoundResponse { round, spins }))
}
