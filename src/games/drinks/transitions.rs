//! Status transition table.
//!
//! Every operation that touches a game consults [`next_status`] first. The
//! table is the single place that says which operation is legal in which
//! status and where it leads.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use super::types::GameStatus;

/// Operations that can be applied to a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    /// A player joins.
    Join,
    /// Play starts.
    Begin,
    /// A player rolls.
    Roll,
    /// A critical-hit holder hands out a drink.
    Assign,
    /// A round ended in a tie (or a roll-off tied again).
    EnterRollOff,
    /// A roll-off produced a strict winner or loser.
    SettleRollOff,
    /// Nothing is outstanding any more.
    Complete,
    /// Forced close.
    Abandon,
}

/// Target status for `operation` applied in `from`, or `None` if rejected.
pub fn next_status(from: GameStatus, operation: Operation) -> Option<GameStatus> {
    use GameStatus::*;
    use Operation::*;

    match (from, operation) {
        (Waiting, Join) => Some(Waiting),
        (Waiting, Begin) => Some(Active),
        (Waiting, Abandon) => Some(Completed),
        (Waiting, Roll | Assign | EnterRollOff | SettleRollOff | Complete) => None,

        (Active, Join | Roll | Assign) => Some(Active),
        (Active, EnterRollOff) => Some(RollOff),
        (Active, Complete | Abandon) => Some(Completed),
        (Active, Begin | SettleRollOff) => None,

        (RollOff, Roll | Assign | EnterRollOff) => Some(RollOff),
        (RollOff, SettleRollOff) => Some(Active),
        (RollOff, Complete | Abandon) => Some(Completed),
        (RollOff, Join | Begin) => None,

        (Completed, _) => None,
    }
}

/// Returns true if `operation` is legal in `from`.
pub fn allows(from: GameStatus, operation: Operation) -> bool {
    next_status(from, operation).is_some()
}
