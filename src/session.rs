//! Session aggregation: leaderboards over the debt ledger.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::GameError;
use crate::games::drinks::PlayerId;
use crate::ledger::{DebtRecord, Session};
use crate::store::Storage;

/// One row of a session leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct LeaderboardEntry {
    /// Player.
    player_id: PlayerId,
    /// Drinks owed in the session, paid or not.
    drink_count: u32,
    /// Drinks already paid.
    paid_count: u32,
}

impl LeaderboardEntry {
    /// Drinks still owed.
    pub fn unpaid_count(&self) -> u32 {
        self.drink_count - self.paid_count
    }
}

/// Ranks debtors by drinks owed.
///
/// Higher counts come first. Equal counts go to whoever reached that count
/// first in ledger order. Archived records are skipped; the result depends
/// only on the records given.
pub fn rank_debts(records: &[DebtRecord]) -> Vec<LeaderboardEntry> {
    struct Tally {
        drinks: u32,
        paid: u32,
        // ledger position at which each count was reached
        reached: Vec<usize>,
    }

    let mut order: Vec<PlayerId> = Vec::new();
    let mut tallies: HashMap<PlayerId, Tally> = HashMap::new();

    let mut ledger: Vec<&DebtRecord> = records.iter().filter(|r| !r.archived()).collect();
    ledger.sort_by_key(|r| *r.sequence());

    for (position, record) in ledger.into_iter().enumerate() {
        let tally = tallies
            .entry(record.to_player_id().clone())
            .or_insert_with(|| {
                order.push(record.to_player_id().clone());
                Tally {
                    drinks: 0,
                    paid: 0,
                    reached: Vec::new(),
                }
            });
        tally.drinks += 1;
        tally.reached.push(position);
        if *record.paid() {
            tally.paid += 1;
        }
    }

    let mut ranked: Vec<(usize, LeaderboardEntry)> = order
        .into_iter()
        .filter_map(|player_id| {
            let tally = tallies.remove(&player_id)?;
            let reached_at = tally.reached.last().copied().unwrap_or(usize::MAX);
            Some((
                reached_at,
                LeaderboardEntry {
                    player_id,
                    drink_count: tally.drinks,
                    paid_count: tally.paid,
                },
            ))
        })
        .collect();
    ranked.sort_by(|(a_at, a), (b_at, b)| {
        b.drink_count
            .cmp(&a.drink_count)
            .then_with(|| a_at.cmp(b_at))
    });
    ranked.into_iter().map(|(_, entry)| entry).collect()
}

/// Session lifecycle and leaderboards for a channel.
#[derive(Clone)]
pub struct SessionAggregator {
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for SessionAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAggregator").finish_non_exhaustive()
    }
}

impl SessionAggregator {
    /// Creates an aggregator over `storage`.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Replaces the channel's active session with a fresh one.
    ///
    /// Games already running keep booking to the session they started in.
    #[instrument(skip(self))]
    pub fn start_new_session(
        &self,
        channel_id: &str,
        created_by: &str,
    ) -> Result<Session, GameError> {
        let session = self
            .storage
            .create_session(channel_id, created_by, Utc::now())?;
        info!(session_id = %session.id(), "New session started");
        Ok(session)
    }

    /// The channel's active session, if any.
    #[instrument(skip(self))]
    pub fn active_session(&self, channel_id: &str) -> Result<Option<Session>, GameError> {
        Ok(self.storage.get_active_session(channel_id)?)
    }

    /// Leaderboard of the channel's active session. Empty without one.
    #[instrument(skip(self))]
    pub fn leaderboard(&self, channel_id: &str) -> Result<Vec<LeaderboardEntry>, GameError> {
        let Some(session) = self.storage.get_active_session(channel_id)? else {
            debug!("No active session");
            return Ok(Vec::new());
        };
        let records = self.storage.list_by_session(session.id())?;
        let board = rank_debts(&records);
        debug!(session_id = %session.id(), records = records.len(), players = board.len(), "Leaderboard computed");
        Ok(board)
    }
}
