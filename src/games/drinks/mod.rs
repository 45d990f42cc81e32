//! Drink dice game: a channel-scoped game where dice decide who owes drinks.

mod invariants;
mod machine;
mod transitions;
mod types;

pub use invariants::{
    CompletionConsistentInvariant, DrinksInvariants, Invariant, InvariantSet, InvariantViolation,
    ParticipantStatusInvariant, RollOffConsistentInvariant, UniqueParticipantsInvariant, verify,
};
pub use machine::{AssignReport, JoinOutcome, PendingDebts, RollReport, RoundResolution};
pub use transitions::{Operation, allows, next_status};
pub use types::{
    ChannelId, Completion, Game, GameId, GameStatus, Participant, ParticipantStatus, PlayerId,
    RollOff, RollOffType, SessionId,
};
