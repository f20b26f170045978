//! Free-rounds grant endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::PlayerId;
use domain::{GameId, Money};
use saga::GameCatalog;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::aggregator::FreespinGrant;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub player_id: String,
    pub game_id: String,
    pub rounds: u32,
    /// Stake of each free round, in minor units.
    pub bet: i64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GrantResponse {
    pub freerounds_id: String,
}

/// POST /freespins — grant free rounds through the game's aggregator.
#[tracing::instrument(skip(state, req), fields(game_id = %req.game_id))]
pub async fn grant(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GrantRequest>,
) -> Result<(StatusCode, Json<GrantResponse>), ApiError> {
    let player_id = uuid::Uuid::parse_str(&req.player_id)
        .map(PlayerId::from_uuid)
        .map_err(|e| ApiError::BadRequest(format!("Invalid player_id: {e}")))?;

    let game_id = GameId::new(req.game_id.as_str());
    let game = state
        .games
        .find_game(&game_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Game {game_id} not found")))?;

    let adapters = state
        .registry
        .adapters(state.registry.resolve(&game.aggregator)?)?;

    let freerounds_id = adapters
        .freespins
        .grant(FreespinGrant {
            player_id,
            game_id,
            rounds: req.rounds,
            bet: Money::from_minor(req.bet),
            expires_at: req.expires_at,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(GrantResponse { freerounds_id })))
}
