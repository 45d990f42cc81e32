//! In-memory backend.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, instrument};

use super::{
    DebtLedger, GameStore, SessionStore, Storage, StoreError, check_version, new_id,
};
use crate::games::drinks::{ChannelId, Game, GameId};
use crate::ledger::{DebtRecord, NewDebt, Session};

#[derive(Debug, Default)]
struct Inner {
    games: HashMap<GameId, Game>,
    /// Game ids per channel, oldest first.
    channel_games: HashMap<ChannelId, Vec<GameId>>,
    debts: Vec<DebtRecord>,
    next_sequence: i64,
    sessions: Vec<Session>,
}

impl Inner {
    fn save(&mut self, game: &Game) -> Result<Game, StoreError> {
        let stored = self.games.get(game.id()).map(|g| *g.version());
        check_version(game, stored)?;
        if stored.is_none() {
            self.channel_games
                .entry(game.channel_id().clone())
                .or_default()
                .push(game.id().clone());
        }
        let mut saved = game.clone();
        saved.set_version(game.version() + 1);
        self.games.insert(saved.id().clone(), saved.clone());
        Ok(saved)
    }

    fn append(&mut self, debt: NewDebt) -> DebtRecord {
        self.next_sequence += 1;
        let record = DebtRecord::from_new(new_id(), self.next_sequence, debt);
        self.debts.push(record.clone());
        record
    }

    fn listed(&self, keep: impl Fn(&DebtRecord) -> bool) -> Vec<DebtRecord> {
        self.debts
            .iter()
            .filter(|d| !d.archived() && keep(d))
            .cloned()
            .collect()
    }
}

/// Storage backed by process memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameStore for InMemoryStorage {
    fn get(&self, channel_id: &str) -> Result<Option<Game>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .channel_games
            .get(channel_id)
            .and_then(|ids| ids.last())
            .and_then(|id| inner.games.get(id))
            .cloned())
    }

    fn get_by_id(&self, game_id: &str) -> Result<Option<Game>, StoreError> {
        Ok(self.inner.read().games.get(game_id).cloned())
    }

    #[instrument(skip(self, game), fields(game_id = %game.id(), version = game.version()))]
    fn save(&self, game: &Game) -> Result<Game, StoreError> {
        self.inner.write().save(game)
    }

    fn delete(&self, game_id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        let Some(game) = inner.games.remove(game_id) else {
            return Ok(false);
        };
        if let Some(ids) = inner.channel_games.get_mut(game.channel_id()) {
            ids.retain(|id| id != game_id);
        }
        Ok(true)
    }
}

impl DebtLedger for InMemoryStorage {
    fn create_record(&self, debt: NewDebt) -> Result<DebtRecord, StoreError> {
        Ok(self.inner.write().append(debt))
    }

    #[instrument(skip(self))]
    fn mark_paid(&self, debt_id: &str, at: DateTime<Utc>) -> Result<DebtRecord, StoreError> {
        let mut inner = self.inner.write();
        let record = inner
            .debts
            .iter_mut()
            .find(|d| d.id() == debt_id)
            .ok_or_else(|| StoreError::missing("debt", debt_id))?;
        if !record.mark_paid(at) {
            return Err(StoreError::AlreadyPaid(debt_id.to_string()));
        }
        Ok(record.clone())
    }

    fn list_by_game(&self, game_id: &str) -> Result<Vec<DebtRecord>, StoreError> {
        Ok(self.inner.read().listed(|d| d.game_id() == game_id))
    }

    fn list_by_player(&self, player_id: &str) -> Result<Vec<DebtRecord>, StoreError> {
        Ok(self.inner.read().listed(|d| d.to_player_id() == player_id))
    }

    fn list_by_session(&self, session_id: &str) -> Result<Vec<DebtRecord>, StoreError> {
        Ok(self.inner.read().listed(|d| d.session_id() == session_id))
    }

    fn archive_by_game(&self, game_id: &str) -> Result<usize, StoreError> {
        let mut inner = self.inner.write();
        let mut archived = 0;
        for record in inner
            .debts
            .iter_mut()
            .filter(|d| d.game_id() == game_id && !d.archived())
        {
            record.archive();
            archived += 1;
        }
        debug!(game_id, archived, "Archived debts");
        Ok(archived)
    }

    fn delete_by_game(&self, game_id: &str) -> Result<usize, StoreError> {
        let mut inner = self.inner.write();
        let before = inner.debts.len();
        inner.debts.retain(|d| d.game_id() != game_id);
        Ok(before - inner.debts.len())
    }
}

impl SessionStore for InMemoryStorage {
    #[instrument(skip(self))]
    fn create_session(
        &self,
        channel_id: &str,
        created_by: &str,
        at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        let mut inner = self.inner.write();
        for session in inner
            .sessions
            .iter_mut()
            .filter(|s| s.channel_id() == channel_id && *s.active())
        {
            session.deactivate();
        }
        let session = Session::new(
            new_id(),
            channel_id.to_string(),
            at,
            created_by.to_string(),
            true,
        );
        inner.sessions.push(session.clone());
        Ok(session)
    }

    fn get_active_session(&self, channel_id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self
            .inner
            .read()
            .sessions
            .iter()
            .find(|s| s.channel_id() == channel_id && *s.active())
            .cloned())
    }
}

impl Storage for InMemoryStorage {
    #[instrument(skip(self, game, debts), fields(game_id = %game.id(), debts = debts.len()))]
    fn commit_game(
        &self,
        game: &Game,
        debts: Vec<NewDebt>,
    ) -> Result<(Game, Vec<DebtRecord>), StoreError> {
        let mut inner = self.inner.write();
        let saved = inner.save(game)?;
        let records = debts.into_iter().map(|d| inner.append(d)).collect();
        Ok((saved, records))
    }
}
