//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::AppState;
use api::aggregator::onegamehub::{self, OneGameHubConfig};
use api::aggregator::{AdapterRegistry, AggregatorTag};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::PlayerId;
use domain::{Balance, Game, Money, Session};
use ledger::{InMemoryLedger, RoundRepository};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::SagaConfig;
use serde_json::Value;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn setup_with_state() -> (axum::Router, Arc<AppState>) {
    let mut registry = AdapterRegistry::new();
    registry.register(
        AggregatorTag::OneGameHub,
        onegamehub::factory(OneGameHubConfig::default()),
    );
    let state =
        api::create_default_state(InMemoryLedger::new(), registry, SagaConfig::no_retry()).await;
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

/// Opens a funded session in `ogh-fruit-party` and returns its token.
fn funded_session(state: &AppState, real: i64, bonus: i64) -> Session {
    let session = Session::open(PlayerId::new(), "ogh-fruit-party", "EUR");
    state.wallet.set_balance(
        session.player_id,
        "EUR",
        Balance::new(Money::from_minor(real), Money::from_minor(bonus)),
    );
    state.sessions.insert(session.clone());
    session
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn callback(app: &axum::Router, query: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .uri(format!("/callbacks/onegamehub?{query}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup_with_state().await;

    let (status, json) = send(
        &app,
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, state) = setup_with_state().await;
    let session = funded_session(&state, 1_000, 0);
    callback(&app, &format!("action=balance&extra={}", session.token)).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("callbacks_total"));
}

#[tokio::test]
async fn test_balance_callback() {
    let (app, state) = setup_with_state().await;
    let session = funded_session(&state, 1_000, 250);

    let (status, json) = callback(&app, &format!("action=balance&extra={}", session.token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], 200);
    assert_eq!(json["balance"], 1_250);
    assert_eq!(json["currency"], "EUR");
}

#[tokio::test]
async fn test_bet_win_and_round_lookup() {
    let (app, state) = setup_with_state().await;
    let session = funded_session(&state, 1_000, 0);

    let (status, json) = callback(
        &app,
        &format!(
            "action=bet&extra={}&game_id=ogh-fruit-party&round_id=r-1&transaction_id=t-bet&amount=300",
            session.token
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["balance"], 700);

    let (status, json) = callback(
        &app,
        &format!(
            "action=win&extra={}&round_id=r-1&transaction_id=t-win&amount=900&ext_round_finished=1",
            session.token
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["balance"], 1_600);

    let round = state
        .coordinator
        .collaborators()
        .rounds
        .find_by_session_and_ext_id(session.id, "r-1")
        .await
        .unwrap()
        .unwrap();
    assert!(round.finished);

    let (status, json) = send(
        &app,
        Request::builder()
            .uri(format!("/rounds/{}", round.id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["round"]["finished"], true);
    assert_eq!(json["spins"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_replayed_bet_is_not_charged_twice() {
    let (app, state) = setup_with_state().await;
    let session = funded_session(&state, 1_000, 0);
    let query = format!(
        "action=bet&extra={}&round_id=r-1&transaction_id=t-bet&amount=400",
        session.token
    );

    let (_, first) = callback(&app, &query).await;
    let (status, second) = callback(&app, &query).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["balance"], 600);
    assert_eq!(second["balance"], 600);
}

#[tokio::test]
async fn test_cancel_refunds_bet() {
    let (app, state) = setup_with_state().await;
    let session = funded_session(&state, 1_000, 0);
    callback(
        &app,
        &format!(
            "action=bet&extra={}&round_id=r-1&transaction_id=t-bet&amount=500",
            session.token
        ),
    )
    .await;

    let (status, json) = callback(
        &app,
        &format!(
            "action=cancel&extra={}&round_id=r-1&transaction_id=t-bet",
            session.token
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["balance"], 1_000);
}

#[tokio::test]
async fn test_zero_win_with_finished_round_closes_round() {
    let (app, state) = setup_with_state().await;
    let session = funded_session(&state, 1_000, 0);
    callback(
        &app,
        &format!(
            "action=bet&extra={}&round_id=r-1&transaction_id=t-bet&amount=100",
            session.token
        ),
    )
    .await;

    let (status, json) = callback(
        &app,
        &format!(
            "action=win&extra={}&round_id=r-1&transaction_id=t-win&amount=0&ext_round_finished=1",
            session.token
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["balance"], 900);
    let round = state
        .coordinator
        .collaborators()
        .rounds
        .find_by_session_and_ext_id(session.id, "r-1")
        .await
        .unwrap()
        .unwrap();
    assert!(round.finished);
}

#[tokio::test]
async fn test_insufficient_funds_error_body() {
    let (app, state) = setup_with_state().await;
    let session = funded_session(&state, 100, 0);

    let (status, json) = callback(
        &app,
        &format!(
            "action=bet&extra={}&round_id=r-1&transaction_id=t-bet&amount=500",
            session.token
        ),
    )
    .await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json["status"], 402);
    assert_eq!(json["code"], "ERR_INSUFFICIENT_FUNDS");
    assert_eq!(
        state.wallet.balance_of(session.player_id, "EUR").total(),
        Money::from_minor(100)
    );
}

#[tokio::test]
async fn test_unknown_token_is_unauthorized() {
    let (app, _) = setup_with_state().await;

    let (status, json) = callback(&app, "action=balance&extra=nope").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "ERR_INVALID_TOKEN");
}

#[tokio::test]
async fn test_token_of_another_aggregators_game_is_unauthorized() {
    let (app, state) = setup_with_state().await;
    state
        .games
        .upsert(Game::new("acme-lucky-7", "Lucky 7", "acme"));
    let session = Session::open(PlayerId::new(), "acme-lucky-7", "EUR");
    state.wallet.set_balance(
        session.player_id,
        "EUR",
        Balance::new(Money::from_minor(1_000), Money::zero()),
    );
    state.sessions.insert(session.clone());

    let (status, json) = callback(
        &app,
        &format!(
            "action=bet&extra={}&round_id=r-1&transaction_id=t-1&amount=100",
            session.token
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "ERR_INVALID_TOKEN");
    assert_eq!(
        state.wallet.balance_of(session.player_id, "EUR").real,
        Money::from_minor(1_000)
    );
}

#[tokio::test]
async fn test_unknown_aggregator_and_action() {
    let (app, state) = setup_with_state().await;
    let session = funded_session(&state, 100, 0);

    let (status, _) = send(
        &app,
        Request::builder()
            .uri(format!("/callbacks/acme?action=balance&extra={}", session.token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = callback(&app, &format!("action=jackpot&extra={}", session.token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "ERR_BAD_REQUEST");
}

#[tokio::test]
async fn test_cancel_of_unknown_transaction_is_not_found() {
    let (app, state) = setup_with_state().await;
    let session = funded_session(&state, 1_000, 0);
    callback(
        &app,
        &format!(
            "action=bet&extra={}&round_id=r-1&transaction_id=t-bet&amount=100",
            session.token
        ),
    )
    .await;

    let (status, json) = callback(
        &app,
        &format!(
            "action=cancel&extra={}&round_id=r-1&transaction_id=t-other",
            session.token
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "ERR_NOT_FOUND");
}

#[tokio::test]
async fn test_round_not_found() {
    let (app, _) = setup_with_state().await;

    let (status, _) = send(
        &app,
        Request::builder()
            .uri(format!("/rounds/{}", uuid::Uuid::new_v4()))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Request::builder()
            .uri("/rounds/not-a-uuid")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_open_session_then_bet() {
    let (app, state) = setup_with_state().await;
    let player_id = PlayerId::new();
    state.wallet.set_balance(
        player_id,
        "EUR",
        Balance::new(Money::from_minor(500), Money::zero()),
    );

    let (status, json) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/sessions")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({
                    "player_id": player_id.to_string(),
                    "game_id": "ogh-book-of-gold",
                    "currency": "EUR",
                    "platform": "mobile"
                })
                .to_string(),
            ))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let token = json["token"].as_str().unwrap().to_string();
    let launch_url = json["launch_url"].as_str().unwrap();
    assert!(launch_url.contains("game_id=ogh-book-of-gold"));
    assert!(launch_url.contains("platform=mobile"));
    assert!(launch_url.contains(&token));

    let (status, json) = callback(
        &app,
        &format!("action=bet&extra={token}&round_id=r-1&transaction_id=t-1&amount=200"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["balance"], 300);
}

#[tokio::test]
async fn test_open_session_for_unknown_game() {
    let (app, _) = setup_with_state().await;

    let (status, json) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/sessions")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({ "game_id": "missing", "currency": "EUR" }).to_string(),
            ))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "ERR_NOT_FOUND");
}

#[tokio::test]
async fn test_free_spin_grant_and_spin() {
    let (app, state) = setup_with_state().await;
    let session = funded_session(&state, 100, 0);

    let (status, json) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/freespins")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({
                    "player_id": session.player_id.to_string(),
                    "game_id": "ogh-fruit-party",
                    "rounds": 10,
                    "bet": 20,
                    "expires_at": "2030-01-01T00:00:00Z"
                })
                .to_string(),
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let freerounds_id = json["freerounds_id"].as_str().unwrap().to_string();

    // Free rounds are funded by the promotion, not the wallet.
    let (status, json) = callback(
        &app,
        &format!(
            "action=bet&extra={}&round_id=r-1&transaction_id=t-1&amount=20&freerounds_id={freerounds_id}",
            session.token
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["balance"], 100);
}

#[tokio::test]
async fn test_invalid_free_spin_grant() {
    let (app, _) = setup_with_state().await;

    let (status, json) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/freespins")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({
                    "player_id": PlayerId::new().to_string(),
                    "game_id": "ogh-fruit-party",
                    "rounds": 0,
                    "bet": 20,
                    "expires_at": "2030-01-01T00:00:00Z"
                })
                .to_string(),
            ))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "ERR_BAD_REQUEST");
}
