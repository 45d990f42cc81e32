//! Game operation errors.

use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumIter};

use crate::games::drinks::{ChannelId, GameId, GameStatus, PlayerId};
use crate::ledger::DebtId;
use crate::store::StoreError;

/// Stable classification of a rejected operation.
///
/// Callers pick their message category from this; it never changes for a
/// given [`GameError`] variant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Game, player or record absent.
    NotFound,
    /// Operation not allowed in the current status.
    InvalidState,
    /// Duplicate or concurrent action.
    Conflict,
    /// The operation's precondition does not hold.
    PreconditionFailed,
    /// Storage unreachable or an internal invariant broke.
    Fatal,
}

/// Error returned by every game, ledger and session operation.
#[derive(Debug, Clone, Display, Error, From)]
pub enum GameError {
    /// The channel already has an open game.
    #[display("channel {channel_id} already has game {game_id} in progress")]
    GameAlreadyInProgress {
        /// Channel.
        channel_id: ChannelId,
        /// The open game.
        game_id: GameId,
    },

    /// No game with this id.
    #[display("game {_0} not found")]
    GameNotFound(#[error(not(source))] GameId),

    /// The channel never had a game.
    #[display("no game found in channel {_0}")]
    NoGameInChannel(#[error(not(source))] ChannelId),

    /// Joining is closed.
    #[display("game {game_id} cannot be joined while {status}")]
    GameNotJoinable {
        /// Game.
        game_id: GameId,
        /// Status at the time of the request.
        status: GameStatus,
    },

    /// Begin was requested twice.
    #[display("game {game_id} has already started ({status})")]
    GameAlreadyStarted {
        /// Game.
        game_id: GameId,
        /// Status at the time of the request.
        status: GameStatus,
    },

    /// Begin with nobody joined.
    #[display("game {game_id} needs at least one player to begin")]
    InsufficientPlayers {
        /// Game.
        game_id: GameId,
    },

    /// Roll or assign outside of play.
    #[display("game {game_id} is not being played ({status})")]
    GameNotActive {
        /// Game.
        game_id: GameId,
        /// Status at the time of the request.
        status: GameStatus,
    },

    /// Abandon on a finished game.
    #[display("game {game_id} is already completed")]
    GameAlreadyCompleted {
        /// Game.
        game_id: GameId,
    },

    /// The player never joined.
    #[display("player {player_id} is not in game {game_id}")]
    NotAParticipant {
        /// Game.
        game_id: GameId,
        /// Player.
        player_id: PlayerId,
    },

    /// Second roll in the same round.
    #[display("player {player_id} already rolled this round in game {game_id}")]
    AlreadyRolled {
        /// Game.
        game_id: GameId,
        /// Player.
        player_id: PlayerId,
    },

    /// Roll by a player outside the contested tie.
    #[display("player {player_id} is not part of the roll-off in game {game_id}")]
    NotInRollOff {
        /// Game.
        game_id: GameId,
        /// Player.
        player_id: PlayerId,
    },

    /// Assign by a player without a pending critical hit.
    #[display("player {player_id} has no drink to hand out in game {game_id}")]
    NotPendingAssignment {
        /// Game.
        game_id: GameId,
        /// Player.
        player_id: PlayerId,
    },

    /// Assign to self or to someone outside the game.
    #[display("player {from_player_id} cannot hand a drink to {to_player_id} in game {game_id}")]
    InvalidAssignmentTarget {
        /// Game.
        game_id: GameId,
        /// Assigner.
        from_player_id: PlayerId,
        /// Requested target.
        to_player_id: PlayerId,
    },

    /// Pay with a clean slate.
    #[display("player {player_id} has no unpaid debts")]
    NoUnpaidDebts {
        /// Player.
        player_id: PlayerId,
    },

    /// Debt record absent.
    #[display("debt {_0} not found")]
    DebtNotFound(#[error(not(source))] DebtId),

    /// Debt record paid before.
    #[display("debt {_0} is already paid")]
    AlreadyPaid(#[error(not(source))] DebtId),

    /// A transition left the game in an inconsistent state.
    #[display("invariant violation: {_0}")]
    InvariantViolation(#[error(not(source))] String),

    /// Storage failure.
    #[from]
    #[display("{_0}")]
    Storage(StoreError),
}

impl GameError {
    /// Returns the stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::GameNotFound(_)
            | Self::NoGameInChannel(_)
            | Self::NotAParticipant { .. }
            | Self::DebtNotFound(_) => ErrorKind::NotFound,

            Self::GameNotJoinable { .. }
            | Self::GameAlreadyStarted { .. }
            | Self::GameNotActive { .. }
            | Self::GameAlreadyCompleted { .. }
            | Self::NotInRollOff { .. }
            | Self::NotPendingAssignment { .. } => ErrorKind::InvalidState,

            Self::GameAlreadyInProgress { .. } | Self::AlreadyRolled { .. } | Self::AlreadyPaid(_) => {
                ErrorKind::Conflict
            }

            Self::InsufficientPlayers { .. }
            | Self::InvalidAssignmentTarget { .. }
            | Self::NoUnpaidDebts { .. } => ErrorKind::PreconditionFailed,

            Self::InvariantViolation(_) => ErrorKind::Fatal,

            Self::Storage(err) => match err {
                StoreError::Missing { .. } => ErrorKind::NotFound,
                StoreError::StaleVersion { .. } | StoreError::AlreadyPaid(_) => ErrorKind::Conflict,
                StoreError::Backend(_) => ErrorKind::Fatal,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BackendStage;

    #[test]
    fn test_kinds_are_stable() {
        let rolled = GameError::AlreadyRolled {
            game_id: "g".into(),
            player_id: "p".into(),
        };
        assert_eq!(rolled.kind(), ErrorKind::Conflict);
        assert_eq!(rolled.clone().kind(), rolled.kind());

        let target = GameError::InvalidAssignmentTarget {
            game_id: "g".into(),
            from_player_id: "x".into(),
            to_player_id: "x".into(),
        };
        assert_eq!(target.kind(), ErrorKind::PreconditionFailed);

        let inactive = GameError::GameNotActive {
            game_id: "g".into(),
            status: GameStatus::Completed,
        };
        assert_eq!(inactive.kind(), ErrorKind::InvalidState);
        assert_eq!(
            inactive.to_string(),
            "game g is not being played (completed)"
        );
    }

    #[test]
    fn test_storage_failures_are_never_not_found_unless_missing() {
        let backend: GameError = StoreError::backend(BackendStage::Query, "disk on fire").into();
        assert_eq!(backend.kind(), ErrorKind::Fatal);

        let missing: GameError = StoreError::missing("game", "g").into();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let stale: GameError = StoreError::StaleVersion {
            game_id: "g".into(),
            expected: 1,
            found: 2,
        }
        .into();
        assert_eq!(stale.kind(), ErrorKind::Conflict);
    }
}
