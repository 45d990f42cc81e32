//! HTTP adapter.
//!
//! A thin axum layer over [`DrinkService`] and [`SessionAggregator`]. The
//! service is synchronous, so every handler hands its call to a blocking
//! thread.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::error::{ErrorKind, GameError};
use crate::games::drinks::Game;
use crate::ledger::{DebtRecord, Session};
use crate::service::{AssignResult, DrinkService, JoinResult, PaymentReceipt, RollResult};
use crate::session::{LeaderboardEntry, SessionAggregator};

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    service: DrinkService,
    sessions: SessionAggregator,
}

impl AppState {
    /// Builds state whose aggregator shares the service's storage.
    pub fn new(service: DrinkService) -> Self {
        let sessions = SessionAggregator::new(service.storage().clone());
        Self { service, sessions }
    }
}

/// Body of `POST /channels/{channel}/games`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGameRequest {
    /// Creator.
    pub creator_id: String,
    /// Creator display name.
    pub creator_name: String,
}

/// Body of `POST /games/{game}/join`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Joining player.
    pub player_id: String,
    /// Display name.
    pub player_name: String,
}

/// Body of `POST /games/{game}/roll`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollRequest {
    /// Rolling player.
    pub player_id: String,
}

/// Body of `POST /games/{game}/assign`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRequest {
    /// Critical-hit holder.
    pub from_player_id: String,
    /// Target.
    pub to_player_id: String,
}

/// Body of `POST /channels/{channel}/sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSessionRequest {
    /// Who opens the session.
    pub created_by: String,
}

/// Error body: `{ "kind": ..., "message": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable classification.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Handler failure.
#[derive(Debug)]
pub enum ApiError {
    /// A rejected operation.
    Game(GameError),
    /// The blocking task died.
    Internal(String),
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        Self::Game(err)
    }
}

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidState | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::PreconditionFailed => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Fatal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (kind, message) = match self {
            ApiError::Game(err) => (err.kind(), err.to_string()),
            ApiError::Internal(message) => (ErrorKind::Fatal, message),
        };
        let status = status_for(kind);
        if status.is_server_error() {
            error!(%kind, %message, "Request failed");
        } else {
            warn!(%kind, %message, "Request rejected");
        }
        (status, Json(ErrorBody { kind, message })).into_response()
    }
}

async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, GameError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("Worker failed: {}", e)))?
        .map_err(ApiError::from)
}

/// Builds the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/channels/{channel}/games", post(create_game))
        .route("/channels/{channel}/games/current", get(current_game))
        .route("/channels/{channel}/sessions", post(start_session))
        .route("/channels/{channel}/leaderboard", get(leaderboard))
        .route("/games/{game}/join", post(join_game))
        .route("/games/{game}/begin", post(begin_game))
        .route("/games/{game}/roll", post(roll_dice))
        .route("/games/{game}/assign", post(assign_drink))
        .route("/games/{game}/abandon", post(abandon_game))
        .route("/players/{player}/pay", post(pay_debt))
        .route("/players/{player}/debts", get(list_debts))
        .with_state(state)
}

/// Binds `address` and serves until the process stops.
#[instrument(skip(state))]
pub async fn serve(address: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!(address = %listener.local_addr()?, "Listening");
    axum::serve(listener, router(state)).await
}

async fn create_game(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Json(req): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<Game>), ApiError> {
    let game = blocking(move || {
        state
            .service
            .create_game(&channel, &req.creator_id, &req.creator_name)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(game)))
}

async fn current_game(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Json<Game>, ApiError> {
    Ok(Json(blocking(move || state.service.current_game(&channel)).await?))
}

async fn join_game(
    State(state): State<AppState>,
    Path(game): Path<String>,
    Json(req): Json<JoinRequest>,
) -> Result<Json<JoinResult>, ApiError> {
    Ok(Json(
        blocking(move || state.service.join_game(&game, &req.player_id, &req.player_name)).await?,
    ))
}

async fn begin_game(
    State(state): State<AppState>,
    Path(game): Path<String>,
) -> Result<Json<Game>, ApiError> {
    Ok(Json(blocking(move || state.service.begin_game(&game)).await?))
}

async fn roll_dice(
    State(state): State<AppState>,
    Path(game): Path<String>,
    Json(req): Json<RollRequest>,
) -> Result<Json<RollResult>, ApiError> {
    Ok(Json(
        blocking(move || state.service.roll_dice(&game, &req.player_id)).await?,
    ))
}

async fn assign_drink(
    State(state): State<AppState>,
    Path(game): Path<String>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<AssignResult>, ApiError> {
    Ok(Json(
        blocking(move || {
            state
                .service
                .assign_drink(&game, &req.from_player_id, &req.to_player_id)
        })
        .await?,
    ))
}

async fn abandon_game(
    State(state): State<AppState>,
    Path(game): Path<String>,
) -> Result<Json<Game>, ApiError> {
    Ok(Json(blocking(move || state.service.abandon_game(&game)).await?))
}

async fn pay_debt(
    State(state): State<AppState>,
    Path(player): Path<String>,
) -> Result<Json<PaymentReceipt>, ApiError> {
    Ok(Json(blocking(move || state.service.pay_debt(&player)).await?))
}

async fn list_debts(
    State(state): State<AppState>,
    Path(player): Path<String>,
) -> Result<Json<Vec<DebtRecord>>, ApiError> {
    Ok(Json(blocking(move || state.service.list_debts(&player)).await?))
}

async fn start_session(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Json(req): Json<NewSessionRequest>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let session = blocking(move || {
        state
            .sessions
            .start_new_session(&channel, &req.created_by)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn leaderboard(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    Ok(Json(blocking(move || state.sessions.leaderboard(&channel)).await?))
}
