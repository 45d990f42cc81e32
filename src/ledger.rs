//! Debt ledger domain types.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::games::drinks::{ChannelId, GameId, PlayerId, SessionId};

/// Unique identifier for a debt record.
pub type DebtId = String;

/// Why a debt was created.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DebtReason {
    /// Handed out by a player who rolled the highest face.
    CriticalHit,
    /// Taken by a player who rolled the lowest face.
    CriticalFail,
    /// Taken by the sole lowest roller of a round.
    LowestRoll,
}

/// A debt about to be written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
pub struct NewDebt {
    /// Game that produced the debt.
    game_id: GameId,
    /// Session the debt is booked to.
    session_id: SessionId,
    /// Who handed it out; `None` when the rules assigned it.
    from_player_id: Option<PlayerId>,
    /// Who owes.
    to_player_id: PlayerId,
    /// Why.
    reason: DebtReason,
    /// When it was incurred.
    timestamp: DateTime<Utc>,
}

/// A debt stored in the ledger.
///
/// Only the paid flag (and the administrative archive flag) ever changes
/// after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct DebtRecord {
    /// Record identity.
    id: DebtId,
    /// Ledger insertion order.
    sequence: i64,
    /// Game that produced the debt.
    game_id: GameId,
    /// Session the debt is booked to.
    session_id: SessionId,
    /// Who handed it out; `None` when the rules assigned it.
    from_player_id: Option<PlayerId>,
    /// Who owes.
    to_player_id: PlayerId,
    /// Why.
    reason: DebtReason,
    /// When it was incurred.
    timestamp: DateTime<Utc>,
    /// Whether it has been paid.
    paid: bool,
    /// When it was paid.
    paid_timestamp: Option<DateTime<Utc>>,
    /// Hidden from listings after an administrative archive.
    archived: bool,
}

impl DebtRecord {
    /// Materializes a new debt with its ledger identity.
    pub fn from_new(id: DebtId, sequence: i64, debt: NewDebt) -> Self {
        Self {
            id,
            sequence,
            game_id: debt.game_id,
            session_id: debt.session_id,
            from_player_id: debt.from_player_id,
            to_player_id: debt.to_player_id,
            reason: debt.reason,
            timestamp: debt.timestamp,
            paid: false,
            paid_timestamp: None,
            archived: false,
        }
    }

    /// Rebuilds a stored record. Used by storage backends.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: DebtId,
        sequence: i64,
        game_id: GameId,
        session_id: SessionId,
        from_player_id: Option<PlayerId>,
        to_player_id: PlayerId,
        reason: DebtReason,
        timestamp: DateTime<Utc>,
        paid_timestamp: Option<DateTime<Utc>>,
        archived: bool,
    ) -> Self {
        Self {
            id,
            sequence,
            game_id,
            session_id,
            from_player_id,
            to_player_id,
            reason,
            timestamp,
            paid: paid_timestamp.is_some(),
            paid_timestamp,
            archived,
        }
    }

    /// Returns true if no player handed this debt out.
    pub fn is_system_assigned(&self) -> bool {
        self.from_player_id.is_none()
    }

    /// Applies the single unpaid → paid transition.
    ///
    /// Returns false, leaving the record untouched, if it was already paid.
    pub fn mark_paid(&mut self, at: DateTime<Utc>) -> bool {
        if self.paid {
            return false;
        }
        self.paid = true;
        self.paid_timestamp = Some(at);
        true
    }

    /// Hides the record from listings.
    pub fn archive(&mut self) {
        self.archived = true;
    }
}

/// A channel-scoped grouping of games sharing one leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
pub struct Session {
    /// Session identity.
    id: SessionId,
    /// Channel the session belongs to.
    channel_id: ChannelId,
    /// When it was opened.
    created_at: DateTime<Utc>,
    /// Who opened it.
    created_by: PlayerId,
    /// At most one active session per channel.
    active: bool,
}

impl Session {
    /// Marks the session inactive.
    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DebtRecord {
        DebtRecord::from_new(
            "d1".into(),
            1,
            NewDebt::new(
                "g1".into(),
                "s1".into(),
                None,
                "bob".into(),
                DebtReason::CriticalFail,
                Utc::now(),
            ),
        )
    }

    #[test]
    fn test_new_record_is_unpaid() {
        let record = record();
        assert!(!record.paid());
        assert!(record.paid_timestamp().is_none());
        assert!(record.is_system_assigned());
    }

    #[test]
    fn test_mark_paid_only_once() {
        let mut record = record();
        let first = Utc::now();
        assert!(record.mark_paid(first));
        assert!(!record.mark_paid(Utc::now()));
        assert_eq!(*record.paid_timestamp(), Some(first));
    }

    #[test]
    fn test_reason_strings() {
        assert_eq!(DebtReason::LowestRoll.to_string(), "lowest_roll");
        assert_eq!(
            "critical_hit".parse::<DebtReason>().ok(),
            Some(DebtReason::CriticalHit)
        );
    }
}
