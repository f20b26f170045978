//! Session launch endpoint.
//!
//! Session management belongs to the platform; this endpoint only opens a
//! session so a game can be launched locally.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::PlayerId;
use domain::{GameId, Platform, Session};
use saga::GameCatalog;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    pub player_id: Option<String>,
    pub game_id: String,
    pub currency: String,
    pub locale: Option<String>,
    #[serde(default)]
    pub platform: Platform,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenSessionResponse {
    pub session_id: String,
    pub player_id: String,
    pub token: String,
    pub launch_url: String,
}

/// POST /sessions — open a session and build the game's launch URL.
#[tracing::instrument(skip(state, req), fields(game_id = %req.game_id))]
pub async fn open(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<OpenSessionResponse>), ApiError> {
    let player_id = match req.player_id.as_deref() {
        Some(id) => PlayerId::from_uuid(
            uuid::Uuid::parse_str(id)
                .map_err(|e| ApiError::BadRequest(format!("Invalid player_id: {e}")))?,
        ),
        None => PlayerId::new(),
    };

    let game = state
        .games
        .find_game(&GameId::new(req.game_id.as_str()))
        .await?
        .filter(|g| g.active)
        .ok_or_else(|| ApiError::NotFound(format!("Game {} not found", req.game_id)))?;

    let tag = state.registry.resolve(&game.aggregator)?;
    let adapters = state.registry.adapters(tag)?;

    let mut session = Session::open(player_id, game.id.clone(), req.currency.as_str());
    if let Some(locale) = req.locale {
        session.locale = locale;
    }
    session.platform = req.platform;

    let launch_url = adapters.launch.launch_url(&session, &game)?;
    state.sessions.insert(session.clone());
    tracing::info!(session_id = %session.id, player_id = %player_id, "session opened");

    Ok((
        StatusCode::CREATED,
        Json(OpenSessionResponse {
            session_id: session.id.to_string(),
            player_id: player_id.to_string(),
            token: session.token,
            launch_url,
        }),
    ))
}
