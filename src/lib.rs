//! Strictly Drinks library - a drink-debt dice game engine
//!
//! Players in a channel roll a six-sided die; the dice decide who owes
//! drinks. Debts land in an append-only ledger grouped into channel
//! sessions, which feed a leaderboard.
//!
//! # Architecture
//!
//! - **Dice**: pure roll and round resolution (`strictly_dice`)
//! - **Games**: the game aggregate and its state machine
//! - **Store**: storage contracts with in-memory and SQLite backends
//! - **Service**: locked load-transition-commit operations
//! - **Session**: session lifecycle and leaderboards
//! - **Server**: axum HTTP adapter
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strictly_dice::ScriptedRoller;
//! use strictly_drinks::{DrinkService, InMemoryStorage};
//!
//! # fn example() -> Result<(), strictly_drinks::GameError> {
//! let service = DrinkService::new(
//!     Arc::new(InMemoryStorage::new()),
//!     Arc::new(ScriptedRoller::from_values([3, 5])),
//! );
//! let game = service.create_game("#bar", "amy", "Amy")?;
//! service.join_game(game.id(), "amy", "Amy")?;
//! service.join_game(game.id(), "bob", "Bob")?;
//! service.begin_game(game.id())?;
//! service.roll_dice(game.id(), "amy")?;
//! let result = service.roll_dice(game.id(), "bob")?;
//! assert!(result.report().completed);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod config;
mod db;
mod error;
mod games;
mod ledger;
mod server;
mod service;
mod session;
mod store;

// Crate-level exports
pub use config::{AppConfig, ConfigError, ENV_DATABASE, ENV_HOST, ENV_PORT, IN_MEMORY};
pub use db::{MIGRATIONS, SqliteStorage};
pub use error::{ErrorKind, GameError};
pub use games::drinks::{
    AssignReport, ChannelId, Completion, CompletionConsistentInvariant, DrinksInvariants, Game,
    GameId, GameStatus, Invariant, InvariantSet, InvariantViolation, JoinOutcome, Operation,
    Participant, ParticipantStatus, ParticipantStatusInvariant, PendingDebts, PlayerId, RollOff,
    RollOffConsistentInvariant, RollOffType, RollReport, RoundResolution, SessionId,
    UniqueParticipantsInvariant, allows, next_status, verify,
};
pub use ledger::{DebtId, DebtReason, DebtRecord, NewDebt, Session};
pub use server::{
    ApiError, AppState, AssignRequest, CreateGameRequest, ErrorBody, JoinRequest,
    NewSessionRequest, RollRequest, router, serve, status_for,
};
pub use service::{AssignResult, DrinkService, JoinResult, PaymentReceipt, RollResult};
pub use session::{LeaderboardEntry, SessionAggregator, rank_debts};
pub use store::{
    BackendError, BackendStage, DebtLedger, GameLocks, GameStore, InMemoryStorage, SessionStore,
    Storage, StoreError,
};
