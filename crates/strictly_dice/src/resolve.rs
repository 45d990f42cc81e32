//! Roll and round resolution.
//!
//! Everything here is a pure function of already-produced faces. Roll-offs
//! are driven by the caller: when [`resolve_round`] reports a tie, the tied
//! players roll again and the new faces are resolved the same way. Nothing
//! bounds how often that repeats; each round ends with positive probability,
//! so the loop terminates with probability one.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::{instrument, trace};

use crate::DieFace;

/// Immediate consequence of a single roll.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RollOutcome {
    /// Highest face: the roller may hand a drink to another player.
    CriticalHit,
    /// Lowest face: the roller owes a drink immediately.
    CriticalFail,
    /// Any other face: no immediate effect.
    Normal,
}

impl RollOutcome {
    /// Returns true if the roller has a choice to make before the round can end.
    pub fn needs_assignment(self) -> bool {
        matches!(self, Self::CriticalHit)
    }
}

/// Classifies a single roll.
///
/// `first_roll_of_round` does not change the outcome; it is accepted so
/// callers can trace opening rolls without a separate code path.
#[instrument]
pub fn resolve_roll(face: DieFace, first_roll_of_round: bool) -> RollOutcome {
    let outcome = if face.is_max() {
        RollOutcome::CriticalHit
    } else if face.is_min() {
        RollOutcome::CriticalFail
    } else {
        RollOutcome::Normal
    };
    trace!(%face, first_roll_of_round, %outcome, "Resolved roll");
    outcome
}

/// Which extreme of a round decides it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The minimum face decides (lowest roller takes the penalty).
    Lowest,
    /// The maximum face decides.
    Highest,
}

impl TieBreak {
    /// Returns true if `candidate` beats `current` under this comparator.
    fn beats(self, candidate: DieFace, current: DieFace) -> bool {
        match self {
            Self::Lowest => candidate < current,
            Self::Highest => candidate > current,
        }
    }
}

/// Outcome of resolving one round of rolls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundOutcome<P> {
    /// Exactly one player holds the extreme face.
    Decided {
        /// The sole holder.
        player: P,
        /// The extreme face.
        face: DieFace,
    },
    /// Several players share the extreme face and must roll off.
    Tied {
        /// Holders in input order.
        players: Vec<P>,
        /// The shared face.
        face: DieFace,
    },
    /// No rolls were supplied.
    Empty,
}

impl<P> RoundOutcome<P> {
    /// Returns the extreme face, if any roll was supplied.
    pub fn face(&self) -> Option<DieFace> {
        match self {
            Self::Decided { face, .. } | Self::Tied { face, .. } => Some(*face),
            Self::Empty => None,
        }
    }
}

/// Resolves a round: finds the extreme face under `tie_break` and who holds it.
///
/// Only the supplied rolls take part, so a roll-off passes just the tied
/// players' new faces. Tied players are reported in the order they appear in
/// `rolls`.
#[instrument(skip(rolls), fields(rolls = rolls.len()))]
pub fn resolve_round<P: Clone>(rolls: &[(P, DieFace)], tie_break: TieBreak) -> RoundOutcome<P> {
    let Some(extreme) = rolls
        .iter()
        .map(|(_, face)| *face)
        .reduce(|best, face| if tie_break.beats(face, best) { face } else { best })
    else {
        return RoundOutcome::Empty;
    };

    let mut holders: Vec<P> = rolls
        .iter()
        .filter(|(_, face)| *face == extreme)
        .map(|(player, _)| player.clone())
        .collect();

    trace!(%extreme, holders = holders.len(), %tie_break, "Resolved round");

    if holders.len() == 1 {
        RoundOutcome::Decided {
            player: holders.remove(0),
            face: extreme,
        }
    } else {
        RoundOutcome::Tied {
            players: holders,
            face: extreme,
        }
    }
}
