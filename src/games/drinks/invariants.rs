//! First-class invariants for drink games.
//!
//! Each invariant is a property of a single [`Game`] snapshot. They are
//! checked after every committed transition in debug builds and can be
//! tested on hand-built states.

use std::collections::HashSet;

use super::types::{Completion, Game, GameStatus, ParticipantStatus};
use crate::error::GameError;

/// A logical property that must hold for a given state.
pub trait Invariant<S> {
    /// Checks if the invariant holds for the given state.
    fn holds(state: &S) -> bool;

    /// Human-readable description of the invariant.
    fn description() -> &'static str;
}

/// Violation of an invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub description: String,
}

impl InvariantViolation {
    /// Creates a new invariant violation.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// A set of invariants that can be checked together.
///
/// Implementations are provided for tuples.
pub trait InvariantSet<S> {
    /// Checks all invariants in the set, collecting every violation.
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>>;
}

fn collect(violations: Vec<InvariantViolation>) -> Result<(), Vec<InvariantViolation>> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

impl<S, I1, I2> InvariantSet<S> for (I1, I2)
where
    I1: Invariant<S>,
    I2: Invariant<S>,
{
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>> {
        let mut violations = Vec::new();
        if !I1::holds(state) {
            violations.push(InvariantViolation::new(I1::description()));
        }
        if !I2::holds(state) {
            violations.push(InvariantViolation::new(I2::description()));
        }
        collect(violations)
    }
}

impl<S, I1, I2, I3, I4> InvariantSet<S> for (I1, I2, I3, I4)
where
    I1: Invariant<S>,
    I2: Invariant<S>,
    I3: Invariant<S>,
    I4: Invariant<S>,
{
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>> {
        let mut violations = Vec::new();
        if !I1::holds(state) {
            violations.push(InvariantViolation::new(I1::description()));
        }
        if !I2::holds(state) {
            violations.push(InvariantViolation::new(I2::description()));
        }
        if !I3::holds(state) {
            violations.push(InvariantViolation::new(I3::description()));
        }
        if !I4::holds(state) {
            violations.push(InvariantViolation::new(I4::description()));
        }
        collect(violations)
    }
}

/// Invariant: a roll-off exists exactly while the game is in one, and it is
/// contested by at least two participants.
pub struct RollOffConsistentInvariant;

impl Invariant<Game> for RollOffConsistentInvariant {
    fn holds(game: &Game) -> bool {
        match game.roll_off() {
            None => *game.status() != GameStatus::RollOff,
            Some(roll_off) => {
                *game.status() == GameStatus::RollOff
                    && roll_off.player_ids().len() >= 2
                    && roll_off
                        .player_ids()
                        .iter()
                        .all(|id| game.has_participant(id))
            }
        }
    }

    fn description() -> &'static str {
        "Roll-off present exactly in roll_off status, contested by two or more participants"
    }
}

/// Invariant: completion data is present exactly for completed games.
pub struct CompletionConsistentInvariant;

impl Invariant<Game> for CompletionConsistentInvariant {
    fn holds(game: &Game) -> bool {
        let completed = *game.status() == GameStatus::Completed;
        completed == game.completion().is_some() && completed == game.completed_at().is_some()
    }

    fn description() -> &'static str {
        "Completion and completion time present exactly when completed"
    }
}

/// Invariant: nobody joined twice.
pub struct UniqueParticipantsInvariant;

impl Invariant<Game> for UniqueParticipantsInvariant {
    fn holds(game: &Game) -> bool {
        let mut seen = HashSet::new();
        game.participants()
            .iter()
            .all(|p| seen.insert(p.player_id().as_str()))
    }

    fn description() -> &'static str {
        "Each player appears at most once"
    }
}

/// Invariant: participant statuses agree with the game status.
///
/// Roll-off statuses only appear for roll-off members, and a resolved game
/// leaves nobody owing a roll or a choice.
pub struct ParticipantStatusInvariant;

impl Invariant<Game> for ParticipantStatusInvariant {
    fn holds(game: &Game) -> bool {
        game.participants().iter().all(|p| {
            let contesting = game
                .roll_off()
                .as_ref()
                .is_some_and(|r| r.includes(p.player_id()));
            let roll_off_status = matches!(
                p.status(),
                ParticipantStatus::InRollOff | ParticipantStatus::RolledInRollOff
            );
            if roll_off_status && !contesting && *game.status() != GameStatus::Completed {
                return false;
            }
            match (game.status(), game.completion()) {
                (GameStatus::Completed, Some(Completion::Resolved)) => !p.status().is_pending(),
                _ => true,
            }
        })
    }

    fn description() -> &'static str {
        "Participant statuses match the game status"
    }
}

/// All drink game invariants as a composable set.
pub type DrinksInvariants = (
    RollOffConsistentInvariant,
    CompletionConsistentInvariant,
    UniqueParticipantsInvariant,
    ParticipantStatusInvariant,
);

/// Checks [`DrinksInvariants`], folding violations into one error.
pub fn verify(game: &Game) -> Result<(), GameError> {
    DrinksInvariants::check_all(game).map_err(|violations| {
        let descriptions = violations
            .iter()
            .map(|v| v.description.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        GameError::InvariantViolation(format!(
            "postcondition failed for game {}: {}",
            game.id(),
            descriptions
        ))
    })
}
