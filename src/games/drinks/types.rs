//! Core domain types for the drinking dice game.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use strictly_dice::{DieFace, TieBreak};
use strum::{Display, EnumIter, EnumString};

/// Unique identifier for a game.
pub type GameId = String;

/// Unique identifier for a player (platform user id).
pub type PlayerId = String;

/// Identifier of the channel or community a game runs in.
pub type ChannelId = String;

/// Unique identifier for a ledger session.
pub type SessionId = String;

/// Lifecycle status of a game.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Created, accepting players, nobody rolls yet.
    Waiting,
    /// Round in progress.
    Active,
    /// A tie is being contested by a subset of players.
    RollOff,
    /// Terminal.
    Completed,
}

impl GameStatus {
    /// Returns true for every status except [`GameStatus::Completed`].
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Completed)
    }

    /// Returns true while dice may be rolled.
    pub fn accepts_rolls(self) -> bool {
        matches!(self, Self::Active | Self::RollOff)
    }
}

/// Per-player status within a game.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    /// Done for the current round.
    Active,
    /// Expected to roll in the current round.
    WaitingToRoll,
    /// Rolled a critical hit and must pick a target.
    NeedsToAssign,
    /// Contesting a roll-off, has not rolled in this roll-off round.
    InRollOff,
    /// Contesting a roll-off, already rolled in this roll-off round.
    RolledInRollOff,
}

impl ParticipantStatus {
    /// Returns true if the participant still owes a roll or a choice.
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            Self::WaitingToRoll | Self::NeedsToAssign | Self::InRollOff
        )
    }
}

/// One player's state within one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct Participant {
    /// Player identity.
    player_id: PlayerId,
    /// Display name cached at join time. Never used as identity.
    player_name: String,
    /// Status in the current round.
    status: ParticipantStatus,
    /// Last roll in the current round.
    roll_value: Option<DieFace>,
    /// Time of the last roll in the current round.
    roll_time: Option<DateTime<Utc>>,
}

impl Participant {
    /// Creates a participant expected to roll.
    pub fn new(player_id: PlayerId, player_name: String) -> Self {
        Self {
            player_id,
            player_name,
            status: ParticipantStatus::WaitingToRoll,
            roll_value: None,
            roll_time: None,
        }
    }

    /// Returns true once the participant rolled in the current round.
    pub fn has_rolled(&self) -> bool {
        self.roll_time.is_some()
    }

    /// Records a roll.
    pub(super) fn record_roll(&mut self, face: DieFace, at: DateTime<Utc>) {
        self.roll_value = Some(face);
        self.roll_time = Some(at);
    }

    /// Clears the roll and sets the status for a new round.
    pub(super) fn reset_for_round(&mut self, status: ParticipantStatus) {
        self.status = status;
        self.roll_value = None;
        self.roll_time = None;
    }

    pub(super) fn set_status(&mut self, status: ParticipantStatus) {
        self.status = status;
    }
}

/// Which tie a roll-off contests.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RollOffType {
    /// Players shared the highest roll.
    Highest,
    /// Players shared the lowest roll.
    Lowest,
}

impl RollOffType {
    /// The comparator that decides this roll-off.
    pub fn tie_break(self) -> TieBreak {
        match self {
            Self::Highest => TieBreak::Highest,
            Self::Lowest => TieBreak::Lowest,
        }
    }
}

/// An ongoing roll-off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct RollOff {
    /// Which extreme is contested.
    kind: RollOffType,
    /// Players still contesting, in join order.
    player_ids: Vec<PlayerId>,
    /// Starts at 1; incremented each time the roll-off ties again.
    round: u32,
}

impl RollOff {
    pub(super) fn new(kind: RollOffType, player_ids: Vec<PlayerId>) -> Self {
        Self {
            kind,
            player_ids,
            round: 1,
        }
    }

    /// Returns true if the player is contesting.
    pub fn includes(&self, player_id: &str) -> bool {
        self.player_ids.iter().any(|p| p == player_id)
    }

    /// Narrows to the newly tied players and advances the round counter.
    pub(super) fn repeat_with(&mut self, player_ids: Vec<PlayerId>) {
        self.player_ids = player_ids;
        self.round += 1;
    }
}

/// How a game reached [`GameStatus::Completed`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// Every roll, assignment and roll-off was resolved.
    Resolved,
    /// Forced closed by an abandon request.
    Abandoned,
}

/// One game in one channel.
///
/// All mutation goes through the transition methods in this module, which
/// keep `status`, `roll_off` and `completion` consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct Game {
    /// Game identity.
    id: GameId,
    /// Channel the game runs in.
    channel_id: ChannelId,
    /// Who started the game.
    creator_id: PlayerId,
    /// Creator display name.
    creator_name: String,
    /// Ledger session the game's debts are booked to.
    session_id: SessionId,
    /// Lifecycle status.
    status: GameStatus,
    /// Present exactly while `status` is [`GameStatus::RollOff`].
    roll_off: Option<RollOff>,
    /// Participants in join order.
    participants: Vec<Participant>,
    /// Set once the current round's lowest roll has been settled.
    round_resolved: bool,
    /// Present exactly while `status` is [`GameStatus::Completed`].
    completion: Option<Completion>,
    /// Creation time.
    created_at: DateTime<Utc>,
    /// Completion time.
    completed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency version, maintained by the game store.
    version: u64,
}

impl Game {
    /// Creates a game in [`GameStatus::Waiting`] with no participants.
    pub fn new(
        id: GameId,
        channel_id: ChannelId,
        creator_id: PlayerId,
        creator_name: String,
        session_id: SessionId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            channel_id,
            creator_id,
            creator_name,
            session_id,
            status: GameStatus::Waiting,
            roll_off: None,
            participants: Vec::new(),
            round_resolved: false,
            completion: None,
            created_at,
            completed_at: None,
            version: 0,
        }
    }

    /// Roll-off kind, `None` unless a roll-off is running.
    pub fn roll_off_type(&self) -> Option<RollOffType> {
        self.roll_off.as_ref().map(|r| *r.kind())
    }

    /// Contesting players, empty unless a roll-off is running.
    pub fn roll_off_player_ids(&self) -> &[PlayerId] {
        self.roll_off
            .as_ref()
            .map(|r| r.player_ids().as_slice())
            .unwrap_or(&[])
    }

    /// Roll-off round counter, 0 unless a roll-off is running.
    pub fn roll_off_round(&self) -> u32 {
        self.roll_off.as_ref().map(|r| *r.round()).unwrap_or(0)
    }

    /// Looks up a participant.
    pub fn participant(&self, player_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.player_id == player_id)
    }

    pub(super) fn participant_mut(&mut self, player_id: &str) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.player_id == player_id)
    }

    /// Returns true if the player joined.
    pub fn has_participant(&self, player_id: &str) -> bool {
        self.participant(player_id).is_some()
    }

    /// Players expected to roll in the current round or roll-off round.
    pub fn expected_rollers(&self) -> Vec<&Participant> {
        match &self.roll_off {
            Some(roll_off) => self
                .participants
                .iter()
                .filter(|p| roll_off.includes(&p.player_id))
                .collect(),
            None => self.participants.iter().collect(),
        }
    }

    /// Players who still need to roll in the current round.
    pub fn players_yet_to_roll(&self) -> Vec<&Participant> {
        if !self.status.accepts_rolls() {
            return Vec::new();
        }
        self.expected_rollers()
            .into_iter()
            .filter(|p| !p.has_rolled())
            .collect()
    }

    /// Players holding an unused critical hit.
    pub fn players_pending_assignment(&self) -> Vec<&Participant> {
        self.participants
            .iter()
            .filter(|p| p.status == ParticipantStatus::NeedsToAssign)
            .collect()
    }

    pub(super) fn participants_mut(&mut self) -> &mut Vec<Participant> {
        &mut self.participants
    }

    pub(super) fn roll_off_mut(&mut self) -> Option<&mut RollOff> {
        self.roll_off.as_mut()
    }

    pub(super) fn set_status(&mut self, status: GameStatus) {
        self.status = status;
    }

    pub(super) fn set_roll_off(&mut self, roll_off: Option<RollOff>) {
        self.roll_off = roll_off;
    }

    pub(super) fn set_round_resolved(&mut self, resolved: bool) {
        self.round_resolved = resolved;
    }

    pub(super) fn set_completion(&mut self, completion: Completion, at: DateTime<Utc>) {
        self.completion = Some(completion);
        self.completed_at = Some(at);
    }

    /// Sets the stored version. Only game stores call this.
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game() -> Game {
        Game::new(
            "g1".into(),
            "#bar".into(),
            "creator".into(),
            "Creator".into(),
            "s1".into(),
            Utc::now(),
        )
    }

    #[test]
    fn test_new_game_is_waiting_and_empty() {
        let game = game();
        assert_eq!(*game.status(), GameStatus::Waiting);
        assert!(game.participants().is_empty());
        assert_eq!(game.roll_off_type(), None);
        assert!(game.roll_off_player_ids().is_empty());
        assert_eq!(game.roll_off_round(), 0);
        assert_eq!(*game.version(), 0);
    }

    #[test]
    fn test_status_round_trips_through_strings() {
        for (status, text) in [
            (GameStatus::Waiting, "waiting"),
            (GameStatus::RollOff, "roll_off"),
            (GameStatus::Completed, "completed"),
        ] {
            assert_eq!(status.to_string(), text);
            assert_eq!(text.parse::<GameStatus>().ok(), Some(status));
        }
    }

    #[test]
    fn test_roll_off_repeat_narrows_and_counts() {
        let mut roll_off = RollOff::new(
            RollOffType::Lowest,
            vec!["a".into(), "b".into(), "c".into()],
        );
        assert_eq!(*roll_off.round(), 1);
        roll_off.repeat_with(vec!["a".into(), "c".into()]);
        assert_eq!(*roll_off.round(), 2);
        assert!(roll_off.includes("c"));
        assert!(!roll_off.includes("b"));
    }

    #[test]
    fn test_pending_statuses() {
        assert!(ParticipantStatus::WaitingToRoll.is_pending());
        assert!(ParticipantStatus::NeedsToAssign.is_pending());
        assert!(ParticipantStatus::InRollOff.is_pending());
        assert!(!ParticipantStatus::Active.is_pending());
        assert!(!ParticipantStatus::RolledInRollOff.is_pending());
    }
}
