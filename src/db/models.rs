//! Database models and row conversions.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;
use tracing::instrument;

use crate::db::schema;
use crate::games::drinks::Game;
use crate::ledger::{DebtReason, DebtRecord, NewDebt, Session};
use crate::store::{BackendStage, StoreError};

/// Stored game. The aggregate itself lives in `state` as JSON; the other
/// columns exist for lookups.
#[derive(Debug, Clone, Queryable, Selectable, Getters)]
#[diesel(table_name = schema::games)]
pub struct GameRow {
    seq: i32,
    id: String,
    channel_id: String,
    status: String,
    version: i64,
    state: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl GameRow {
    /// Rebuilds the aggregate, taking the version from its column.
    #[instrument(skip(self), fields(game_id = %self.id, version = self.version))]
    pub fn into_game(self) -> Result<Game, StoreError> {
        let mut game: Game = serde_json::from_str(&self.state)?;
        game.set_version(u64::try_from(self.version).map_err(|_| {
            StoreError::backend(
                BackendStage::Corrupt,
                format!("Negative version {} for game {}", self.version, self.id),
            )
        })?);
        Ok(game)
    }
}

/// Insertable game row.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::games)]
pub struct NewGameRow {
    id: String,
    channel_id: String,
    status: String,
    version: i64,
    state: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

/// Stored debt record.
#[derive(Debug, Clone, Queryable, Selectable, Getters)]
#[diesel(table_name = schema::debts)]
pub struct DebtRow {
    seq: i32,
    id: String,
    game_id: String,
    session_id: String,
    from_player_id: Option<String>,
    to_player_id: String,
    reason: String,
    created_at: NaiveDateTime,
    paid: bool,
    paid_at: Option<NaiveDateTime>,
    archived: bool,
}

impl DebtRow {
    /// Converts to the ledger type.
    pub fn into_record(self) -> Result<DebtRecord, StoreError> {
        let reason = self
            .reason
            .parse::<DebtReason>()
            .map_err(|e| {
                StoreError::backend(
                    BackendStage::Corrupt,
                    format!("Invalid debt reason '{}': {}", self.reason, e),
                )
            })?;
        // paid without paid_at falls back to creation time
        let paid_at = if self.paid {
            self.paid_at.or(Some(self.created_at))
        } else {
            None
        };
        Ok(DebtRecord::restore(
            self.id,
            i64::from(self.seq),
            self.game_id,
            self.session_id,
            self.from_player_id,
            self.to_player_id,
            reason,
            self.created_at.and_utc(),
            paid_at.map(|at| at.and_utc()),
            self.archived,
        ))
    }
}

/// Insertable debt row.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::debts)]
pub struct NewDebtRow {
    id: String,
    game_id: String,
    session_id: String,
    from_player_id: Option<String>,
    to_player_id: String,
    reason: String,
    created_at: NaiveDateTime,
    paid: bool,
    archived: bool,
}

impl NewDebtRow {
    /// Builds an unpaid row for a new debt.
    pub fn from_debt(id: String, debt: NewDebt) -> Self {
        Self {
            id,
            game_id: debt.game_id().clone(),
            session_id: debt.session_id().clone(),
            from_player_id: debt.from_player_id().clone(),
            to_player_id: debt.to_player_id().clone(),
            reason: debt.reason().to_string(),
            created_at: debt.timestamp().naive_utc(),
            paid: false,
            archived: false,
        }
    }
}

/// Stored ledger session.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, Getters)]
#[diesel(table_name = schema::sessions)]
pub struct SessionRow {
    id: String,
    channel_id: String,
    created_by: String,
    created_at: NaiveDateTime,
    active: bool,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session::new(
            row.id,
            row.channel_id,
            row.created_at.and_utc(),
            row.created_by,
            row.active,
        )
    }
}

impl From<&Session> for SessionRow {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id().clone(),
            channel_id: session.channel_id().clone(),
            created_by: session.created_by().clone(),
            created_at: session.created_at().naive_utc(),
            active: *session.active(),
        }
    }
}
