//! Pure six-sided dice rules.
//!
//! This crate owns everything about a roll that needs no I/O:
//!
//! - **Faces**: [`DieFace`], a validated value in `1..=6`
//! - **Sources**: [`DiceRoller`] with a uniform [`RandomRoller`] and a
//!   deterministic [`ScriptedRoller`]
//! - **Resolution**: [`resolve_roll`] classifies a single roll, and
//!   [`resolve_round`] finds the sole holder of a round's extreme value or
//!   reports the tie that requires a roll-off

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod die;
mod resolve;
mod roller;

pub use die::{DieFace, FaceError};
pub use resolve::{RollOutcome, RoundOutcome, TieBreak, resolve_roll, resolve_round};
pub use roller::{DiceRoller, RandomRoller, ScriptedRoller};
