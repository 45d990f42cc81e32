//! Game service: the operations a chat bot or HTTP client calls.
//!
//! Every mutating operation follows the same path: take the per-key lock,
//! load the game, apply the transition on a copy, commit the game together
//! with the debts the transition produced. A rejected transition never
//! reaches the store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use strictly_dice::{DiceRoller, RandomRoller};
use tracing::{debug, info, instrument, warn};

use crate::error::GameError;
use crate::games::drinks::{
    AssignReport, Game, JoinOutcome, PendingDebts, RollReport,
};
use crate::ledger::DebtRecord;
use crate::store::{GameLocks, InMemoryStorage, Storage, StoreError, new_id};

/// Outcome of a roll, with the state it left behind.
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
pub struct RollResult {
    /// What the roll did.
    report: RollReport,
    /// Debts committed with the roll.
    debts: Vec<DebtRecord>,
    /// Game after the roll.
    game: Game,
}

/// Outcome of a drink assignment.
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
pub struct AssignResult {
    /// The critical-hit debt just created.
    record: DebtRecord,
    /// What the assignment did.
    report: AssignReport,
    /// Further debts committed with it (a settled round).
    settled: Vec<DebtRecord>,
    /// Game after the assignment.
    game: Game,
}

/// Outcome of a join request.
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
pub struct JoinResult {
    /// Whether the player was added.
    outcome: JoinOutcome,
    /// Game after the join.
    game: Game,
}

/// A paid debt and what is left to pay.
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
pub struct PaymentReceipt {
    /// The record just paid.
    record: DebtRecord,
    /// Unpaid debts the player still has.
    remaining_unpaid: usize,
}

/// Entry point for game operations.
///
/// Cheap to clone; clones share storage, dice and locks.
#[derive(Clone)]
pub struct DrinkService {
    storage: Arc<dyn Storage>,
    roller: Arc<dyn DiceRoller>,
    locks: Arc<GameLocks>,
}

impl std::fmt::Debug for DrinkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrinkService")
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl DrinkService {
    /// Creates a service over `storage`, drawing faces from `roller`.
    pub fn new(storage: Arc<dyn Storage>, roller: Arc<dyn DiceRoller>) -> Self {
        Self {
            storage,
            roller,
            locks: Arc::new(GameLocks::new()),
        }
    }

    /// In-memory storage with fair dice.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStorage::new()), Arc::new(RandomRoller))
    }

    /// Backing storage.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Opens a game in `channel_id`, booked to the channel's active session.
    #[instrument(skip(self, creator_name))]
    pub fn create_game(
        &self,
        channel_id: &str,
        creator_id: &str,
        creator_name: &str,
    ) -> Result<Game, GameError> {
        self.locks.with(&format!("channel:{channel_id}"), || {
            let existing = self.storage.get(channel_id)?;
            if let Some(existing) = existing.filter(|g| g.status().is_open()) {
                warn!(game_id = %existing.id(), status = %existing.status(), "Game already in progress");
                return Err(GameError::GameAlreadyInProgress {
                    channel_id: channel_id.to_string(),
                    game_id: existing.id().clone(),
                });
            }

            let now = Utc::now();
            let session = match self.storage.get_active_session(channel_id)? {
                Some(session) => session,
                None => {
                    info!("No active session, opening one");
                    self.storage.create_session(channel_id, creator_id, now)?
                }
            };
            let game = Game::new(
                new_id(),
                channel_id.to_string(),
                creator_id.to_string(),
                creator_name.to_string(),
                session.id().clone(),
                now,
            );
            let (saved, _) = self.storage.commit_game(&game, Vec::new())?;
            info!(game_id = %saved.id(), session_id = %saved.session_id(), "Game created");
            Ok(saved)
        })
    }

    /// Adds a player. Joining twice is not an error.
    #[instrument(skip(self, player_name))]
    pub fn join_game(
        &self,
        game_id: &str,
        player_id: &str,
        player_name: &str,
    ) -> Result<JoinResult, GameError> {
        let (outcome, game, _) = self.mutate(game_id, |game, _| {
            Ok((game.join(player_id, player_name)?, PendingDebts::new()))
        })?;
        Ok(JoinResult { outcome, game })
    }

    /// Starts play.
    #[instrument(skip(self))]
    pub fn begin_game(&self, game_id: &str) -> Result<Game, GameError> {
        let ((), game, _) =
            self.mutate(game_id, |game, _| Ok((game.begin()?, PendingDebts::new())))?;
        Ok(game)
    }

    /// Rolls for `player_id`.
    #[instrument(skip(self))]
    pub fn roll_dice(&self, game_id: &str, player_id: &str) -> Result<RollResult, GameError> {
        let roller = Arc::clone(&self.roller);
        let (report, game, debts) =
            self.mutate(game_id, |game, at| game.roll(player_id, roller.as_ref(), at))?;
        Ok(RollResult {
            report,
            debts,
            game,
        })
    }

    /// Hands a drink from a critical-hit holder to `to_player_id`.
    #[instrument(skip(self))]
    pub fn assign_drink(
        &self,
        game_id: &str,
        from_player_id: &str,
        to_player_id: &str,
    ) -> Result<AssignResult, GameError> {
        let (report, game, mut debts) = self.mutate(game_id, |game, at| {
            game.assign(from_player_id, to_player_id, at)
        })?;
        if debts.is_empty() {
            return Err(GameError::InvariantViolation(format!(
                "assignment in game {game_id} committed without a debt"
            )));
        }
        let record = debts.remove(0);
        Ok(AssignResult {
            record,
            report,
            settled: debts,
            game,
        })
    }

    /// Forces a game closed.
    #[instrument(skip(self))]
    pub fn abandon_game(&self, game_id: &str) -> Result<Game, GameError> {
        let ((), game, _) = self.mutate(game_id, |game, at| {
            Ok((game.abandon(at)?, PendingDebts::new()))
        })?;
        Ok(game)
    }

    /// Pays the player's oldest unpaid debt.
    #[instrument(skip(self))]
    pub fn pay_debt(&self, player_id: &str) -> Result<PaymentReceipt, GameError> {
        self.locks.with(&format!("player:{player_id}"), || {
            let unpaid: Vec<DebtRecord> = self
                .storage
                .list_by_player(player_id)?
                .into_iter()
                .filter(|d| !d.paid())
                .collect();
            let Some(oldest) = unpaid.first() else {
                debug!("Nothing to pay");
                return Err(GameError::NoUnpaidDebts {
                    player_id: player_id.to_string(),
                });
            };

            let record = self
                .storage
                .mark_paid(oldest.id(), Utc::now())
                .map_err(|err| match err {
                    StoreError::Missing { id, .. } => GameError::DebtNotFound(id),
                    StoreError::AlreadyPaid(id) => GameError::AlreadyPaid(id),
                    other => GameError::Storage(other),
                })?;
            let remaining_unpaid = unpaid.len() - 1;
            info!(debt_id = %record.id(), remaining_unpaid, "Debt paid");
            Ok(PaymentReceipt {
                record,
                remaining_unpaid,
            })
        })
    }

    /// The player's debts, oldest first.
    #[instrument(skip(self))]
    pub fn list_debts(&self, player_id: &str) -> Result<Vec<DebtRecord>, GameError> {
        let debts = self.storage.list_by_player(player_id)?;
        debug!(count = debts.len(), "Debts listed");
        Ok(debts)
    }

    /// Looks up a game.
    #[instrument(skip(self))]
    pub fn get_game(&self, game_id: &str) -> Result<Game, GameError> {
        self.storage
            .get_by_id(game_id)?
            .ok_or_else(|| GameError::GameNotFound(game_id.to_string()))
    }

    /// The channel's latest game, finished or not.
    #[instrument(skip(self))]
    pub fn current_game(&self, channel_id: &str) -> Result<Game, GameError> {
        self.storage
            .get(channel_id)?
            .ok_or_else(|| GameError::NoGameInChannel(channel_id.to_string()))
    }

    /// Runs one transition under the game's lock and commits the result.
    fn mutate<T>(
        &self,
        game_id: &str,
        op: impl FnOnce(&mut Game, DateTime<Utc>) -> Result<(T, PendingDebts), GameError>,
    ) -> Result<(T, Game, Vec<DebtRecord>), GameError> {
        self.locks.with(&format!("game:{game_id}"), || {
            let mut game = self.get_game(game_id)?;
            let (value, debts) = op(&mut game, Utc::now())?;

            #[cfg(debug_assertions)]
            crate::games::drinks::verify(&game)?;

            let (saved, records) = self.storage.commit_game(&game, debts)?;
            for record in &records {
                info!(
                    debt_id = %record.id(),
                    to = %record.to_player_id(),
                    from = ?record.from_player_id(),
                    reason = %record.reason(),
                    "Debt recorded"
                );
            }
            Ok((value, saved, records))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::games::drinks::GameStatus;
    use crate::ledger::DebtReason;
    use strictly_dice::ScriptedRoller;

    fn service(faces: impl IntoIterator<Item = u8>) -> (DrinkService, Arc<ScriptedRoller>) {
        let roller = Arc::new(ScriptedRoller::from_values(faces));
        let service = DrinkService::new(Arc::new(InMemoryStorage::new()), roller.clone());
        (service, roller)
    }

    #[test]
    fn test_second_open_game_in_channel_rejected() {
        let (service, _) = service([]);
        let game = service.create_game("#bar", "amy", "Amy").expect("create");
        let err = service
            .create_game("#bar", "bob", "Bob")
            .expect_err("in progress");
        assert!(matches!(err, GameError::GameAlreadyInProgress { ref game_id, .. } if game_id == game.id()));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        service.abandon_game(game.id()).expect("abandon");
        service.create_game("#bar", "bob", "Bob").expect("create after completion");
    }

    #[test]
    fn test_games_share_the_active_session() {
        let (service, _) = service([]);
        let first = service.create_game("#bar", "amy", "Amy").expect("create");
        service.abandon_game(first.id()).expect("abandon");
        let second = service.create_game("#bar", "bob", "Bob").expect("create");
        assert_eq!(first.session_id(), second.session_id());
    }

    #[test]
    fn test_rejected_roll_leaves_game_untouched() {
        let (service, roller) = service([4]);
        let game = service.create_game("#bar", "amy", "Amy").expect("create");
        service.join_game(game.id(), "amy", "Amy").expect("join");
        let before = service.get_game(game.id()).expect("get");

        let err = service.roll_dice(game.id(), "amy").expect_err("not begun");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(service.get_game(game.id()).expect("get"), before);
        assert_eq!(roller.remaining(), 1);
    }

    #[test]
    fn test_pay_oldest_first() {
        let (service, _) = service([1, 4]);
        let game = service.create_game("#bar", "amy", "Amy").expect("create");
        service.join_game(game.id(), "bob", "Bob").expect("join");
        service.join_game(game.id(), "amy", "Amy").expect("join");
        service.begin_game(game.id()).expect("begin");
        let first = service.roll_dice(game.id(), "bob").expect("roll");
        assert_eq!(*first.debts()[0].reason(), DebtReason::CriticalFail);
        service.roll_dice(game.id(), "amy").expect("roll");

        let receipt = service.pay_debt("bob").expect("pay");
        assert_eq!(receipt.record().id(), first.debts()[0].id());
        assert_eq!(*receipt.remaining_unpaid(), 0);
        assert!(matches!(
            service.pay_debt("bob"),
            Err(GameError::NoUnpaidDebts { .. })
        ));
    }

    #[test]
    fn test_lookups_report_absence() {
        let (service, _) = service([]);
        assert!(matches!(
            service.get_game("nope"),
            Err(GameError::GameNotFound(_))
        ));
        assert!(matches!(
            service.current_game("#empty"),
            Err(GameError::NoGameInChannel(_))
        ));
        assert!(matches!(
            service.join_game("nope", "amy", "Amy"),
            Err(GameError::GameNotFound(_))
        ));
    }

    #[test]
    fn test_assign_returns_the_new_record() {
        let (service, _) = service([6, 3]);
        let game = service.create_game("#bar", "amy", "Amy").expect("create");
        service.join_game(game.id(), "amy", "Amy").expect("join");
        service.join_game(game.id(), "bob", "Bob").expect("join");
        service.begin_game(game.id()).expect("begin");
        service.roll_dice(game.id(), "amy").expect("roll");
        service.roll_dice(game.id(), "bob").expect("roll");

        let result = service
            .assign_drink(game.id(), "amy", "bob")
            .expect("assign");
        assert_eq!(result.record().from_player_id().as_deref(), Some("amy"));
        assert_eq!(*result.record().reason(), DebtReason::CriticalHit);
        assert_eq!(result.settled().len(), 1);
        assert_eq!(*result.game().status(), GameStatus::Completed);
        let owed = service.list_debts("bob").expect("list");
        assert_eq!(owed.len(), 2);
        assert!(owed.iter().all(|d| d.to_player_id() == "bob"));
    }
}
