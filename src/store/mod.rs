//! Storage contracts for games, the debt ledger and sessions.
//!
//! The game core only ever talks to these traits. Two backends ship with the
//! crate: [`InMemoryStorage`] for tests and ephemeral runs, and
//! [`crate::db::SqliteStorage`] for durable state.
//!
//! All methods are synchronous. Async callers run them on a blocking thread.

mod error;
mod in_memory;
mod locks;

pub use error::{BackendError, BackendStage, StoreError};
pub use in_memory::InMemoryStorage;
pub use locks::GameLocks;

use chrono::{DateTime, Utc};

use crate::games::drinks::Game;
use crate::ledger::{DebtRecord, NewDebt, Session};

/// Persistence of game aggregates.
///
/// Saves are optimistic: a game carries the version it was loaded at, and a
/// save only succeeds if the stored version still matches. A game at version
/// 0 has never been saved.
pub trait GameStore: Send + Sync {
    /// The most recently created game in the channel.
    fn get(&self, channel_id: &str) -> Result<Option<Game>, StoreError>;

    /// The game with this id.
    fn get_by_id(&self, game_id: &str) -> Result<Option<Game>, StoreError>;

    /// Inserts or replaces a game. Returns the stored copy with its new version.
    fn save(&self, game: &Game) -> Result<Game, StoreError>;

    /// Removes a game. Returns false if it did not exist.
    fn delete(&self, game_id: &str) -> Result<bool, StoreError>;
}

/// Append-only record of drink debts.
///
/// Records are never mutated except for the paid and archived flags.
/// Listings are in ledger order and skip archived records.
pub trait DebtLedger: Send + Sync {
    /// Appends a debt.
    fn create_record(&self, debt: NewDebt) -> Result<DebtRecord, StoreError>;

    /// Marks a debt paid. Fails with [`StoreError::AlreadyPaid`] on a second call.
    fn mark_paid(&self, debt_id: &str, at: DateTime<Utc>) -> Result<DebtRecord, StoreError>;

    /// Debts produced by one game.
    fn list_by_game(&self, game_id: &str) -> Result<Vec<DebtRecord>, StoreError>;

    /// Debts owed by one player, across sessions.
    fn list_by_player(&self, player_id: &str) -> Result<Vec<DebtRecord>, StoreError>;

    /// Debts booked to one session.
    fn list_by_session(&self, session_id: &str) -> Result<Vec<DebtRecord>, StoreError>;

    /// Hides a game's debts from listings. Returns how many were archived.
    fn archive_by_game(&self, game_id: &str) -> Result<usize, StoreError>;

    /// Removes a game's debts. Returns how many were removed.
    fn delete_by_game(&self, game_id: &str) -> Result<usize, StoreError>;
}

/// Channel-scoped ledger sessions.
pub trait SessionStore: Send + Sync {
    /// Opens a session, deactivating the channel's previous active one.
    fn create_session(
        &self,
        channel_id: &str,
        created_by: &str,
        at: DateTime<Utc>,
    ) -> Result<Session, StoreError>;

    /// The channel's active session, if any.
    fn get_active_session(&self, channel_id: &str) -> Result<Option<Session>, StoreError>;
}

/// A complete backend.
pub trait Storage: GameStore + DebtLedger + SessionStore {
    /// Saves `game` and appends `debts` atomically.
    ///
    /// Either both land or neither does; a stale version rejects the debts too.
    fn commit_game(
        &self,
        game: &Game,
        debts: Vec<NewDebt>,
    ) -> Result<(Game, Vec<DebtRecord>), StoreError>;
}

/// Checks the optimistic version of a save against what is stored.
///
/// `stored` is `None` when no row exists.
pub(crate) fn check_version(game: &Game, stored: Option<u64>) -> Result<(), StoreError> {
    match stored {
        Some(found) if found == *game.version() => Ok(()),
        Some(found) => Err(StoreError::StaleVersion {
            game_id: game.id().clone(),
            expected: *game.version(),
            found,
        }),
        None if *game.version() == 0 => Ok(()),
        None => Err(StoreError::missing("game", game.id().clone())),
    }
}

/// Fresh identifier for games, debts and sessions.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
