//! Aggregator wallet callbacks.
//!
//! OneGameHub calls a single endpoint with an `action` query parameter; each
//! action is turned into a saga request. The callback layer owns no business
//! rules beyond that mapping.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use domain::{Balance, GameId, Money, Session};
use saga::{
    EndRoundRequest, GameCatalog, PlaceSpinRequest, RollbackSpinRequest, SettleSpinRequest,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::AppState;
use crate::error::ApiError;

/// Query parameters of a wallet callback.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub action: String,
    /// Session token handed to the aggregator at launch.
    pub extra: String,
    pub game_id: Option<String>,
    pub round_id: Option<String>,
    pub transaction_id: Option<String>,
    /// Amount in minor units.
    pub amount: Option<i64>,
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub freerounds_id: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub ext_round_finished: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub status: u16,
    /// Total balance in minor units.
    pub balance: i64,
    pub currency: String,
}

impl CallbackResponse {
    fn new(balance: Balance, session: &Session) -> Self {
        Self {
            status: 200,
            balance: balance.total().minor(),
            currency: session.currency.as_str().to_string(),
        }
    }
}

/// GET /callbacks/{aggregator} — balance, bet, win and cancel callbacks.
#[tracing::instrument(
    skip(state, params),
    fields(action = %params.action, round_id = ?params.round_id, transaction_id = ?params.transaction_id)
)]
pub async fn handle(
    State(state): State<Arc<AppState>>,
    Path(aggregator): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<CallbackResponse>, ApiError> {
    let result = dispatch(&state, &aggregator, &params).await;

    let outcome = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!(
        "callbacks_total",
        "aggregator" => aggregator,
        "action" => params.action.clone(),
        "outcome" => outcome
    )
    .increment(1);

    result.map(Json)
}

async fn dispatch(
    state: &AppState,
    aggregator: &str,
    params: &CallbackParams,
) -> Result<CallbackResponse, ApiError> {
    let tag = state
        .registry
        .resolve(aggregator)
        .map_err(|e| ApiError::NotFound(e.to_string()))?;

    let session = state
        .sessions
        .find_by_token(&params.extra)
        .ok_or_else(|| ApiError::Unauthorized("unknown session token".to_string()))?;

    // a token is only valid on the endpoint of the aggregator serving its game
    if let Some(game) = state.games.find_game(&session.game_id).await?
        && !game.aggregator.eq_ignore_ascii_case(tag.as_str())
    {
        return Err(ApiError::Unauthorized(format!(
            "session {} is not served by aggregator {tag}",
            session.id
        )));
    }

    if let Some(currency) = &params.currency
        && !currency.eq_ignore_ascii_case(session.currency.as_str())
    {
        return Err(ApiError::BadRequest(format!(
            "currency {currency} does not match session currency {}",
            session.currency
        )));
    }

    let balance = match params.action.as_str() {
        "balance" => state.coordinator.balance(&session).await?,
        "bet" => bet(state, session.clone(), params).await?,
        "win" => win(state, session.clone(), params).await?,
        "cancel" => cancel(state, session.clone(), params).await?,
        other => return Err(ApiError::BadRequest(format!("unknown action: {other}"))),
    };

    Ok(CallbackResponse::new(balance, &session))
}

async fn bet(state: &AppState, session: Session, params: &CallbackParams) -> Result<Balance, ApiError> {
    let external_round_id = required(&params.round_id, "round_id")?.to_string();
    let request = PlaceSpinRequest {
        game_id: params
            .game_id
            .as_deref()
            .map(GameId::from)
            .unwrap_or_else(|| session.game_id.clone()),
        external_round_id: external_round_id.clone(),
        transaction_id: required(&params.transaction_id, "transaction_id")?.to_string(),
        amount: amount(params)?,
        free_spin_id: params.freerounds_id.clone(),
        session: session.clone(),
    };

    let outcome = state.coordinator.place(request).await?;
    if params.ext_round_finished {
        state
            .coordinator
            .end(EndRoundRequest {
                session,
                external_round_id,
            })
            .await?;
    }
    Ok(outcome.balance)
}

async fn win(state: &AppState, session: Session, params: &CallbackParams) -> Result<Balance, ApiError> {
    let external_round_id = required(&params.round_id, "round_id")?.to_string();
    let request = SettleSpinRequest {
        external_round_id: external_round_id.clone(),
        transaction_id: required(&params.transaction_id, "transaction_id")?.to_string(),
        amount: amount(params)?,
        free_spin_id: params.freerounds_id.clone(),
        finish_round: params.ext_round_finished,
        session: session.clone(),
    };

    if let Some(outcome) = state.coordinator.settle(request).await? {
        return Ok(outcome.balance);
    }

    // Nothing to credit; the round may still need closing.
    if params.ext_round_finished {
        state
            .coordinator
            .end(EndRoundRequest {
                session: session.clone(),
                external_round_id,
            })
            .await?;
    }
    Ok(state.coordinator.balance(&session).await?)
}

async fn cancel(
    state: &AppState,
    session: Session,
    params: &CallbackParams,
) -> Result<Balance, ApiError> {
    let request = RollbackSpinRequest {
        external_round_id: required(&params.round_id, "round_id")?.to_string(),
        transaction_id: required(&params.transaction_id, "transaction_id")?.to_string(),
        session,
    };
    let outcome = state.coordinator.rollback(request).await?;
    Ok(outcome.balance)
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("missing parameter: {name}")))
}

fn amount(params: &CallbackParams) -> Result<Money, ApiError> {
    params
        .amount
        .map(Money::from_minor)
        .ok_or_else(|| ApiError::BadRequest("missing parameter: amount".to_string()))
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_empty()))
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(matches!(value.as_deref(), Some("1") | Some("true")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(query: &str) -> CallbackParams {
        let uri: axum::http::Uri = format!("/callbacks/onegamehub?{query}").parse().unwrap();
        Query::<CallbackParams>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_params_parsing() {
        let params = parse(
            "action=bet&extra=tok&round_id=r1&transaction_id=t1&amount=500&freerounds_id=&ext_round_finished=1",
        );

        assert_eq!(params.action, "bet");
        assert_eq!(params.amount, Some(500));
        assert_eq!(params.freerounds_id, None);
        assert!(params.ext_round_finished);
    }

    #[test]
    fn test_optional_params_default() {
        let params = parse("action=balance&extra=tok");

        assert!(params.round_id.is_none());
        assert!(!params.ext_round_finished);
        assert!(matches!(
            required(&params.round_id, "round_id"),
            Err(ApiError::BadRequest(_))
        ));
    }
}
