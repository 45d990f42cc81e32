//! Game state machine.
//!
//! Transitions on the [`Game`] aggregate. Nothing here touches storage: each
//! operation mutates the game in place and returns the debts it produced, so
//! the caller can persist both in one commit.
//!
//! Round flow:
//!
//! 1. Every expected player rolls. A 6 leaves the roller holding a drink to
//!    hand out, a 1 books a drink on the roller at once. This holds in
//!    roll-offs too.
//! 2. Once everyone rolled and nobody holds a drink, the round settles on its
//!    lowest face. A sole holder takes a drink (a sole 1 is already paid
//!    for); any tie, including one at 1, starts a roll-off.
//! 3. A roll-off is a round restricted to the tied players. Ties repeat it
//!    with the newly tied subset until one player is left.
//!
//! Step 3 is re-entered once per roll-off round rather than recursing, and
//! only ends when the dice produce a strict extreme.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strictly_dice::{DiceRoller, DieFace, RollOutcome, RoundOutcome, resolve_roll, resolve_round};
use tracing::{debug, info, instrument, warn};

use super::transitions::{Operation, next_status};
use super::types::{
    Completion, Game, GameStatus, Participant, ParticipantStatus, PlayerId, RollOff, RollOffType,
};
use crate::error::GameError;
use crate::ledger::{DebtReason, NewDebt};

/// Result of a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinOutcome {
    /// The player was added.
    Joined,
    /// The player was already in the game; nothing changed.
    AlreadyJoined,
}

/// How a completed round (or roll-off round) settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundResolution {
    /// The sole lowest roller takes a drink.
    LowestRoller {
        /// Who pays.
        player_id: PlayerId,
        /// The lowest face.
        face: DieFace,
    },
    /// A sole 1 decided the main round; its holder already owes from the critical fail.
    CoveredByCriticalFail {
        /// Holder of the 1.
        player_ids: Vec<PlayerId>,
    },
    /// The sole highest roller of a highest roll-off earns a drink to hand out.
    HighestRoller {
        /// Winner.
        player_id: PlayerId,
        /// The highest face.
        face: DieFace,
    },
    /// A tie started a roll-off.
    RollOffStarted {
        /// Contested extreme.
        kind: RollOffType,
        /// Tied players.
        player_ids: Vec<PlayerId>,
        /// Shared face.
        face: DieFace,
    },
    /// A roll-off tied again and repeats with the tied subset.
    RollOffRepeated {
        /// Contested extreme.
        kind: RollOffType,
        /// Still tied.
        player_ids: Vec<PlayerId>,
        /// New roll-off round number.
        round: u32,
        /// Shared face.
        face: DieFace,
    },
}

/// What a successful roll did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollReport {
    /// Roller.
    pub player_id: PlayerId,
    /// Face rolled.
    pub face: DieFace,
    /// Classification of the face.
    pub outcome: RollOutcome,
    /// True if nobody else had rolled in this round yet.
    pub first_roll_of_round: bool,
    /// True if the roll contested a roll-off.
    pub in_roll_off: bool,
    /// Who the roller may hand a drink to (critical hit only).
    pub eligible_targets: Vec<PlayerId>,
    /// Round settlement triggered by this roll.
    pub resolution: Option<RoundResolution>,
    /// True if the game completed with this roll.
    pub completed: bool,
}

/// What a successful assignment did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignReport {
    /// Assigner.
    pub from_player_id: PlayerId,
    /// Who now owes.
    pub to_player_id: PlayerId,
    /// Round settlement triggered by the assignment.
    pub resolution: Option<RoundResolution>,
    /// True if the game completed with this assignment.
    pub completed: bool,
}

/// Debts produced by one transition, to be committed with the game.
pub type PendingDebts = Vec<NewDebt>;

impl Game {
    /// Applies the status change for `operation`, or explains the rejection.
    fn transition(&mut self, operation: Operation) -> Result<(), GameError> {
        let from = *self.status();
        match next_status(from, operation) {
            Some(to) => {
                if from != to {
                    debug!(game_id = %self.id(), %from, %to, %operation, "Status transition");
                }
                self.set_status(to);
                Ok(())
            }
            None => {
                warn!(game_id = %self.id(), status = %from, %operation, "Operation rejected");
                Err(self.rejection(operation))
            }
        }
    }

    fn rejection(&self, operation: Operation) -> GameError {
        let game_id = self.id().clone();
        let status = *self.status();
        match operation {
            Operation::Join => GameError::GameNotJoinable { game_id, status },
            Operation::Begin => GameError::GameAlreadyStarted { game_id, status },
            Operation::Roll | Operation::Assign => GameError::GameNotActive { game_id, status },
            Operation::Abandon => GameError::GameAlreadyCompleted { game_id },
            Operation::EnterRollOff | Operation::SettleRollOff | Operation::Complete => {
                GameError::InvariantViolation(format!(
                    "{operation} is not reachable from {status} in game {game_id}"
                ))
            }
        }
    }

    fn debt(
        &self,
        from_player_id: Option<PlayerId>,
        to_player_id: PlayerId,
        reason: DebtReason,
        at: DateTime<Utc>,
    ) -> NewDebt {
        NewDebt::new(
            self.id().clone(),
            self.session_id().clone(),
            from_player_id,
            to_player_id,
            reason,
            at,
        )
    }

    /// Adds a player. Joining twice is a no-op reported as [`JoinOutcome::AlreadyJoined`].
    #[instrument(skip(self), fields(game_id = %self.id()))]
    pub fn join(&mut self, player_id: &str, player_name: &str) -> Result<JoinOutcome, GameError> {
        if self.has_participant(player_id) {
            debug!(player_id, "Player already joined");
            return Ok(JoinOutcome::AlreadyJoined);
        }
        self.transition(Operation::Join)?;
        self.participants_mut()
            .push(Participant::new(player_id.to_string(), player_name.to_string()));
        info!(player_id, players = self.participants().len(), "Player joined");
        Ok(JoinOutcome::Joined)
    }

    /// Starts play. Every participant is expected to roll.
    #[instrument(skip(self), fields(game_id = %self.id()))]
    pub fn begin(&mut self) -> Result<(), GameError> {
        if *self.status() == GameStatus::Waiting && self.participants().is_empty() {
            return Err(GameError::InsufficientPlayers {
                game_id: self.id().clone(),
            });
        }
        self.transition(Operation::Begin)?;
        for participant in self.participants_mut() {
            participant.reset_for_round(ParticipantStatus::WaitingToRoll);
        }
        self.set_round_resolved(false);
        info!(players = self.participants().len(), "Game started");
        Ok(())
    }

    /// Rolls for `player_id` using `roller`.
    ///
    /// The die is only drawn once the request is known to be valid, so a
    /// rejected roll never consumes a face.
    #[instrument(skip(self, roller), fields(game_id = %self.id()))]
    pub fn roll(
        &mut self,
        player_id: &str,
        roller: &dyn DiceRoller,
        at: DateTime<Utc>,
    ) -> Result<(RollReport, PendingDebts), GameError> {
        self.validate_roll(player_id)?;

        let in_roll_off = self.roll_off().is_some();
        let first_roll_of_round = self.expected_rollers().iter().all(|p| !p.has_rolled());
        let face = roller.roll();
        let outcome = resolve_roll(face, first_roll_of_round);
        self.transition(Operation::Roll)?;

        let mut debts = PendingDebts::new();
        let mut eligible_targets = Vec::new();

        let done = if in_roll_off {
            ParticipantStatus::RolledInRollOff
        } else {
            ParticipantStatus::Active
        };
        let status = match outcome {
            RollOutcome::CriticalHit => {
                eligible_targets = self.assignment_targets(player_id);
                ParticipantStatus::NeedsToAssign
            }
            RollOutcome::CriticalFail => {
                debts.push(self.debt(None, player_id.to_string(), DebtReason::CriticalFail, at));
                done
            }
            RollOutcome::Normal => done,
        };

        if let Some(participant) = self.participant_mut(player_id) {
            participant.record_roll(face, at);
            participant.set_status(status);
        }
        info!(player_id, %face, %outcome, in_roll_off, "Player rolled");

        let (resolution, completed) = self.advance(at, &mut debts)?;
        Ok((
            RollReport {
                player_id: player_id.to_string(),
                face,
                outcome,
                first_roll_of_round,
                in_roll_off,
                eligible_targets,
                resolution,
                completed,
            },
            debts,
        ))
    }

    fn validate_roll(&self, player_id: &str) -> Result<(), GameError> {
        if !self.status().accepts_rolls() {
            return Err(self.rejection(Operation::Roll));
        }
        let participant = self
            .participant(player_id)
            .ok_or_else(|| GameError::NotAParticipant {
                game_id: self.id().clone(),
                player_id: player_id.to_string(),
            })?;
        if self.roll_off().as_ref().is_some_and(|r| !r.includes(player_id)) {
            return Err(GameError::NotInRollOff {
                game_id: self.id().clone(),
                player_id: player_id.to_string(),
            });
        }
        if participant.has_rolled() {
            return Err(GameError::AlreadyRolled {
                game_id: self.id().clone(),
                player_id: player_id.to_string(),
            });
        }
        Ok(())
    }

    /// Everyone except `player_id`, in join order.
    pub fn assignment_targets(&self, player_id: &str) -> Vec<PlayerId> {
        self.participants()
            .iter()
            .filter(|p| p.player_id() != player_id)
            .map(|p| p.player_id().clone())
            .collect()
    }

    /// Hands a drink from a critical-hit holder to another participant.
    #[instrument(skip(self), fields(game_id = %self.id()))]
    pub fn assign(
        &mut self,
        from_player_id: &str,
        to_player_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(AssignReport, PendingDebts), GameError> {
        if !self.status().accepts_rolls() {
            return Err(self.rejection(Operation::Assign));
        }
        let assigner = self
            .participant(from_player_id)
            .ok_or_else(|| GameError::NotAParticipant {
                game_id: self.id().clone(),
                player_id: from_player_id.to_string(),
            })?;
        if *assigner.status() != ParticipantStatus::NeedsToAssign {
            return Err(GameError::NotPendingAssignment {
                game_id: self.id().clone(),
                player_id: from_player_id.to_string(),
            });
        }
        if from_player_id == to_player_id || !self.has_participant(to_player_id) {
            warn!(from_player_id, to_player_id, "Invalid assignment target");
            return Err(GameError::InvalidAssignmentTarget {
                game_id: self.id().clone(),
                from_player_id: from_player_id.to_string(),
                to_player_id: to_player_id.to_string(),
            });
        }
        self.transition(Operation::Assign)?;

        let mut debts = vec![self.debt(
            Some(from_player_id.to_string()),
            to_player_id.to_string(),
            DebtReason::CriticalHit,
            at,
        )];
        let contesting = self
            .roll_off()
            .as_ref()
            .is_some_and(|r| r.includes(from_player_id));
        if let Some(participant) = self.participant_mut(from_player_id) {
            participant.set_status(if contesting {
                ParticipantStatus::RolledInRollOff
            } else {
                ParticipantStatus::Active
            });
        }
        info!(from_player_id, to_player_id, contesting, "Drink assigned");

        let (resolution, completed) = self.advance(at, &mut debts)?;
        Ok((
            AssignReport {
                from_player_id: from_player_id.to_string(),
                to_player_id: to_player_id.to_string(),
                resolution,
                completed,
            },
            debts,
        ))
    }

    /// Forces the game closed. Debts already booked stay booked.
    #[instrument(skip(self), fields(game_id = %self.id()))]
    pub fn abandon(&mut self, at: DateTime<Utc>) -> Result<(), GameError> {
        self.transition(Operation::Abandon)?;
        self.set_roll_off(None);
        self.set_completion(Completion::Abandoned, at);
        info!("Game abandoned");
        Ok(())
    }

    /// True when every expected roller rolled and nobody holds a drink to hand out.
    pub fn is_round_complete(&self) -> bool {
        if !self.status().accepts_rolls() {
            return false;
        }
        let expected = self.expected_rollers();
        !expected.is_empty()
            && expected.iter().all(|p| p.has_rolled())
            && self.players_pending_assignment().is_empty()
    }

    /// True when no roll, assignment or roll-off is outstanding anywhere.
    pub fn is_ready_to_complete(&self) -> bool {
        self.status().accepts_rolls()
            && self.roll_off().is_none()
            && *self.round_resolved()
            && self
                .participants()
                .iter()
                .all(|p| p.has_rolled() && !p.status().is_pending())
    }

    /// Settles the round if it just became complete, then closes the game if
    /// nothing is left to do.
    fn advance(
        &mut self,
        at: DateTime<Utc>,
        debts: &mut PendingDebts,
    ) -> Result<(Option<RoundResolution>, bool), GameError> {
        let mut resolution = None;
        if !*self.round_resolved() && self.is_round_complete() {
            resolution = Some(self.settle_round(at, debts)?);
        }
        let completed = if self.is_ready_to_complete() {
            self.transition(Operation::Complete)?;
            self.set_completion(Completion::Resolved, at);
            info!(game_id = %self.id(), "Game completed");
            true
        } else {
            false
        };
        Ok((resolution, completed))
    }

    /// Resolves the faces of the round that just completed.
    fn settle_round(
        &mut self,
        at: DateTime<Utc>,
        debts: &mut PendingDebts,
    ) -> Result<RoundResolution, GameError> {
        let kind = self.roll_off_type().unwrap_or(RollOffType::Lowest);
        let contested = self.roll_off().is_some();
        let rolls: Vec<(PlayerId, DieFace)> = self
            .expected_rollers()
            .into_iter()
            .filter_map(|p| p.roll_value().map(|face| (p.player_id().clone(), face)))
            .collect();

        match resolve_round(&rolls, kind.tie_break()) {
            RoundOutcome::Tied { players, face } => {
                self.enter_roll_off(kind, players.clone())?;
                let round = self.roll_off_round();
                info!(game_id = %self.id(), %kind, tied = players.len(), round, %face, "Roll-off");
                if round == 1 {
                    Ok(RoundResolution::RollOffStarted {
                        kind,
                        player_ids: players,
                        face,
                    })
                } else {
                    Ok(RoundResolution::RollOffRepeated {
                        kind,
                        player_ids: players,
                        round,
                        face,
                    })
                }
            }
            RoundOutcome::Decided { player, face } => {
                if contested {
                    self.transition(Operation::SettleRollOff)?;
                    self.set_roll_off(None);
                    for participant in self.participants_mut() {
                        if *participant.status() == ParticipantStatus::RolledInRollOff {
                            participant.set_status(ParticipantStatus::Active);
                        }
                    }
                }
                match kind {
                    RollOffType::Lowest if !contested && face.is_min() => {
                        self.set_round_resolved(true);
                        Ok(RoundResolution::CoveredByCriticalFail {
                            player_ids: vec![player],
                        })
                    }
                    RollOffType::Lowest => {
                        debts.push(self.debt(None, player.clone(), DebtReason::LowestRoll, at));
                        self.set_round_resolved(true);
                        info!(game_id = %self.id(), player_id = %player, %face, "Lowest roller drinks");
                        Ok(RoundResolution::LowestRoller {
                            player_id: player,
                            face,
                        })
                    }
                    RollOffType::Highest => {
                        if let Some(participant) = self.participant_mut(&player) {
                            participant.set_status(ParticipantStatus::NeedsToAssign);
                        }
                        info!(game_id = %self.id(), player_id = %player, %face, "Highest roller hands out a drink");
                        Ok(RoundResolution::HighestRoller {
                            player_id: player,
                            face,
                        })
                    }
                }
            }
            RoundOutcome::Empty => Err(GameError::InvariantViolation(format!(
                "round of game {} completed without rolls",
                self.id()
            ))),
        }
    }

    /// Starts (or repeats) a roll-off between `player_ids`.
    ///
    /// Contenders are reset to roll again; players dropping out of a repeated
    /// roll-off are done for the round.
    pub(crate) fn enter_roll_off(
        &mut self,
        kind: RollOffType,
        player_ids: Vec<PlayerId>,
    ) -> Result<(), GameError> {
        self.transition(Operation::EnterRollOff)?;
        match self.roll_off_mut() {
            Some(roll_off) => roll_off.repeat_with(player_ids.clone()),
            None => self.set_roll_off(Some(RollOff::new(kind, player_ids.clone()))),
        }
        for participant in self.participants_mut() {
            if player_ids.contains(participant.player_id()) {
                participant.reset_for_round(ParticipantStatus::InRollOff);
            } else if *participant.status() == ParticipantStatus::RolledInRollOff {
                participant.set_status(ParticipantStatus::Active);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strictly_dice::ScriptedRoller;

    fn game() -> Game {
        Game::new(
            "g1".into(),
            "#bar".into(),
            "a".into(),
            "A".into(),
            "s1".into(),
            Utc::now(),
        )
    }

    fn started(players: &[&str]) -> Game {
        let mut game = game();
        for p in players {
            game.join(p, &p.to_uppercase()).expect("join");
        }
        game.begin().expect("begin");
        game
    }

    fn roll(game: &mut Game, player: &str, value: u8) -> (RollReport, PendingDebts) {
        let roller = ScriptedRoller::from_values([value]);
        game.roll(player, &roller, Utc::now()).expect("roll")
    }

    #[test]
    fn test_join_is_idempotent() {
        let mut game = game();
        assert_eq!(game.join("a", "A").expect("join"), JoinOutcome::Joined);
        assert_eq!(game.join("a", "A again").expect("join"), JoinOutcome::AlreadyJoined);
        assert_eq!(game.participants().len(), 1);
        assert_eq!(game.participants()[0].player_name(), "A");
    }

    #[test]
    fn test_begin_requires_players() {
        let mut game = game();
        assert!(matches!(
            game.begin(),
            Err(GameError::InsufficientPlayers { .. })
        ));
        assert_eq!(*game.status(), GameStatus::Waiting);
    }

    #[test]
    fn test_begin_twice_rejected() {
        let mut game = started(&["a"]);
        assert!(matches!(
            game.begin(),
            Err(GameError::GameAlreadyStarted { .. })
        ));
    }

    #[test]
    fn test_roll_before_begin_rejected() {
        let mut game = game();
        game.join("a", "A").expect("join");
        let roller = ScriptedRoller::from_values([3]);
        assert!(matches!(
            game.roll("a", &roller, Utc::now()),
            Err(GameError::GameNotActive { .. })
        ));
        assert_eq!(roller.remaining(), 1, "rejected roll must not draw");
    }

    #[test]
    fn test_roll_by_stranger_rejected() {
        let mut game = started(&["a"]);
        let roller = ScriptedRoller::from_values([3]);
        assert!(matches!(
            game.roll("zed", &roller, Utc::now()),
            Err(GameError::NotAParticipant { .. })
        ));
    }

    #[test]
    fn test_second_roll_rejected() {
        let mut game = started(&["a", "b"]);
        roll(&mut game, "a", 3);
        let roller = ScriptedRoller::from_values([4]);
        assert!(matches!(
            game.roll("a", &roller, Utc::now()),
            Err(GameError::AlreadyRolled { .. })
        ));
        assert_eq!(
            *game.participant("a").expect("a").roll_value(),
            DieFace::try_from(3u8).ok()
        );
    }

    #[test]
    fn test_critical_fail_books_debt_immediately() {
        let mut game = started(&["a", "b"]);
        let (report, debts) = roll(&mut game, "a", 1);
        assert_eq!(report.outcome, RollOutcome::CriticalFail);
        assert_eq!(debts.len(), 1);
        assert_eq!(debts[0].to_player_id(), "a");
        assert_eq!(*debts[0].reason(), DebtReason::CriticalFail);
        assert!(debts[0].from_player_id().is_none());
    }

    #[test]
    fn test_critical_hit_waits_for_assignment() {
        let mut game = started(&["a", "b", "c"]);
        let (report, debts) = roll(&mut game, "a", 6);
        assert!(debts.is_empty());
        assert_eq!(report.eligible_targets, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(
            *game.participant("a").expect("a").status(),
            ParticipantStatus::NeedsToAssign
        );

        roll(&mut game, "b", 3);
        roll(&mut game, "c", 4);
        assert!(!game.is_round_complete(), "pending assignment holds the round");
        assert_eq!(*game.status(), GameStatus::Active);

        let (report, debts) = game.assign("a", "c", Utc::now()).expect("assign");
        assert_eq!(debts[0].to_player_id(), "c");
        assert_eq!(*debts[0].reason(), DebtReason::CriticalHit);
        assert!(report.completed);
        // b held the lowest face
        assert_eq!(debts.len(), 2);
        assert_eq!(debts[1].to_player_id(), "b");
        assert_eq!(*debts[1].reason(), DebtReason::LowestRoll);
    }

    #[test]
    fn test_self_assignment_rejected() {
        let mut game = started(&["a", "b"]);
        roll(&mut game, "a", 6);
        assert!(matches!(
            game.assign("a", "a", Utc::now()),
            Err(GameError::InvalidAssignmentTarget { .. })
        ));
        assert!(matches!(
            game.assign("a", "nobody", Utc::now()),
            Err(GameError::InvalidAssignmentTarget { .. })
        ));
        assert!(matches!(
            game.assign("b", "a", Utc::now()),
            Err(GameError::NotPendingAssignment { .. })
        ));
    }

    #[test]
    fn test_tie_enters_lowest_roll_off() {
        let mut game = started(&["a", "b", "c"]);
        roll(&mut game, "a", 3);
        roll(&mut game, "b", 3);
        let (report, debts) = roll(&mut game, "c", 5);

        assert!(debts.is_empty());
        assert_eq!(*game.status(), GameStatus::RollOff);
        assert_eq!(game.roll_off_type(), Some(RollOffType::Lowest));
        assert_eq!(game.roll_off_player_ids(), ["a".to_string(), "b".to_string()]);
        assert_eq!(game.roll_off_round(), 1);
        assert!(matches!(
            report.resolution,
            Some(RoundResolution::RollOffStarted { .. })
        ));

        let roller = ScriptedRoller::from_values([2]);
        assert!(matches!(
            game.roll("c", &roller, Utc::now()),
            Err(GameError::NotInRollOff { .. })
        ));

        roll(&mut game, "a", 4);
        let (report, debts) = roll(&mut game, "b", 2);
        assert!(report.in_roll_off);
        assert_eq!(debts.len(), 1);
        assert_eq!(debts[0].to_player_id(), "b");
        assert_eq!(*debts[0].reason(), DebtReason::LowestRoll);
        assert!(report.completed);
        assert_eq!(*game.status(), GameStatus::Completed);
        assert!(game.roll_off_player_ids().is_empty());
    }

    #[test]
    fn test_roll_off_repeats_with_tied_subset() {
        let mut game = started(&["a", "b", "c"]);
        roll(&mut game, "a", 2);
        roll(&mut game, "b", 2);
        roll(&mut game, "c", 2);
        assert_eq!(game.roll_off_player_ids().len(), 3);

        roll(&mut game, "a", 3);
        roll(&mut game, "b", 3);
        let (report, _) = roll(&mut game, "c", 5);
        assert!(matches!(
            report.resolution,
            Some(RoundResolution::RollOffRepeated { round: 2, .. })
        ));
        assert_eq!(game.roll_off_player_ids(), ["a".to_string(), "b".to_string()]);
        assert_eq!(
            *game.participant("c").expect("c").status(),
            ParticipantStatus::Active
        );

        let (report, debts) = roll(&mut game, "a", 3);
        assert!(debts.is_empty());
        assert!(!report.completed);
        let (report, debts) = roll(&mut game, "b", 4);
        assert_eq!(debts.len(), 1);
        assert_eq!(debts[0].to_player_id(), "a");
        assert_eq!(*debts[0].reason(), DebtReason::LowestRoll);
        assert!(report.completed);
    }

    #[test]
    fn test_critical_faces_count_inside_a_roll_off() {
        let mut game = started(&["a", "b", "c"]);
        roll(&mut game, "a", 3);
        roll(&mut game, "b", 3);
        roll(&mut game, "c", 5);
        assert_eq!(*game.status(), GameStatus::RollOff);

        let (report, debts) = roll(&mut game, "a", 6);
        assert!(report.in_roll_off);
        assert_eq!(report.outcome, RollOutcome::CriticalHit);
        assert!(debts.is_empty());
        assert_eq!(report.eligible_targets, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(
            *game.participant("a").expect("a").status(),
            ParticipantStatus::NeedsToAssign
        );

        let (report, debts) = roll(&mut game, "b", 1);
        assert_eq!(report.outcome, RollOutcome::CriticalFail);
        assert_eq!(debts.len(), 1);
        assert_eq!(debts[0].to_player_id(), "b");
        assert_eq!(*debts[0].reason(), DebtReason::CriticalFail);
        assert!(report.resolution.is_none(), "a still holds a drink");
        assert_eq!(*game.status(), GameStatus::RollOff);

        let (report, debts) = game.assign("a", "c", Utc::now()).expect("assign");
        assert_eq!(debts.len(), 2);
        assert_eq!(debts[0].to_player_id(), "c");
        assert_eq!(*debts[0].reason(), DebtReason::CriticalHit);
        assert_eq!(debts[1].to_player_id(), "b");
        assert_eq!(*debts[1].reason(), DebtReason::LowestRoll);
        assert!(matches!(
            report.resolution,
            Some(RoundResolution::LowestRoller { ref player_id, .. }) if player_id == "b"
        ));
        assert!(report.completed);
    }

    #[test]
    fn test_tie_at_one_enters_roll_off() {
        let mut game = started(&["a", "b", "c"]);
        let (_, debts) = roll(&mut game, "a", 1);
        assert_eq!(*debts[0].reason(), DebtReason::CriticalFail);
        roll(&mut game, "b", 1);
        let (report, debts) = roll(&mut game, "c", 5);
        assert!(debts.is_empty());
        assert!(matches!(
            report.resolution,
            Some(RoundResolution::RollOffStarted { .. })
        ));
        assert_eq!(*game.status(), GameStatus::RollOff);
        assert_eq!(game.roll_off_player_ids(), ["a".to_string(), "b".to_string()]);

        roll(&mut game, "a", 2);
        let (report, debts) = roll(&mut game, "b", 4);
        assert_eq!(debts.len(), 1);
        assert_eq!(debts[0].to_player_id(), "a");
        assert_eq!(*debts[0].reason(), DebtReason::LowestRoll);
        assert!(report.completed);
    }

    #[test]
    fn test_sole_critical_fail_covers_lowest_roll() {
        let mut game = started(&["a", "b", "c"]);
        roll(&mut game, "a", 1);
        roll(&mut game, "b", 3);
        let (report, debts) = roll(&mut game, "c", 4);
        assert!(debts.is_empty());
        assert!(matches!(
            report.resolution,
            Some(RoundResolution::CoveredByCriticalFail { .. })
        ));
        assert_eq!(*game.status(), GameStatus::Completed);
    }

    #[test]
    fn test_highest_roll_off_grants_assignment() {
        let mut game = started(&["a", "b", "c"]);
        game.enter_roll_off(RollOffType::Highest, vec!["a".into(), "b".into()])
            .expect("roll-off");
        assert_eq!(game.roll_off_type(), Some(RollOffType::Highest));

        roll(&mut game, "a", 5);
        let (report, debts) = roll(&mut game, "b", 2);
        assert!(debts.is_empty());
        assert!(matches!(
            report.resolution,
            Some(RoundResolution::HighestRoller { ref player_id, .. }) if player_id == "a"
        ));
        assert_eq!(*game.status(), GameStatus::Active);
        assert_eq!(
            *game.participant("a").expect("a").status(),
            ParticipantStatus::NeedsToAssign
        );

        game.assign("a", "c", Utc::now()).expect("assign");
        let (report, debts) = roll(&mut game, "c", 4);
        assert!(report.completed);
        assert_eq!(debts.len(), 1);
        assert_eq!(debts[0].to_player_id(), "b");
    }

    #[test]
    fn test_completed_game_rejects_everything() {
        let mut game = started(&["a"]);
        let (report, debts) = roll(&mut game, "a", 4);
        assert!(report.completed);
        assert_eq!(debts.len(), 1, "a lone roller is the lowest roller");
        assert!(!game.is_ready_to_complete());

        let roller = ScriptedRoller::from_values([3]);
        let err = game.roll("a", &roller, Utc::now()).expect_err("completed");
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidState);
        let err = game.assign("a", "b", Utc::now()).expect_err("completed");
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidState);
        assert!(matches!(
            game.join("z", "Z"),
            Err(GameError::GameNotJoinable { .. })
        ));
        assert!(matches!(
            game.abandon(Utc::now()),
            Err(GameError::GameAlreadyCompleted { .. })
        ));
    }

    #[test]
    fn test_abandon_from_roll_off() {
        let mut game = started(&["a", "b"]);
        roll(&mut game, "a", 3);
        roll(&mut game, "b", 3);
        assert_eq!(*game.status(), GameStatus::RollOff);
        game.abandon(Utc::now()).expect("abandon");
        assert_eq!(*game.status(), GameStatus::Completed);
        assert_eq!(*game.completion(), Some(Completion::Abandoned));
        assert!(game.roll_off().is_none());
    }

    #[test]
    fn test_late_join_is_expected_to_roll() {
        let mut game = started(&["a", "b"]);
        roll(&mut game, "a", 4);
        assert_eq!(game.join("c", "C").expect("join"), JoinOutcome::Joined);
        roll(&mut game, "b", 5);
        assert_eq!(*game.status(), GameStatus::Active);
        let (report, debts) = roll(&mut game, "c", 6);
        assert!(!report.completed);
        assert!(debts.is_empty());
    }

    #[test]
    fn test_join_rejected_during_roll_off() {
        let mut game = started(&["a", "b"]);
        roll(&mut game, "a", 2);
        roll(&mut game, "b", 2);
        assert!(matches!(
            game.join("c", "C"),
            Err(GameError::GameNotJoinable {
                status: GameStatus::RollOff,
                ..
            })
        ));
    }
}
