//! Die face value type.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

/// A face of a six-sided die.
///
/// Construction goes through [`TryFrom<u8>`], so a `DieFace` always holds a
/// value in `1..=6`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct DieFace(u8);

impl DieFace {
    /// Lowest face (critical fail).
    pub const MIN: DieFace = DieFace(1);
    /// Highest face (critical hit).
    pub const MAX: DieFace = DieFace(6);

    /// Returns the numeric value.
    pub fn value(self) -> u8 {
        self.0
    }

    /// Returns true for the highest face.
    pub fn is_max(self) -> bool {
        self == Self::MAX
    }

    /// Returns true for the lowest face.
    pub fn is_min(self) -> bool {
        self == Self::MIN
    }

    /// All six faces in ascending order.
    pub fn all() -> impl Iterator<Item = DieFace> {
        (Self::MIN.0..=Self::MAX.0).map(DieFace)
    }
}

/// A value outside `1..=6` was offered as a die face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
#[display("{} is not a face of a six-sided die", value)]
pub struct FaceError {
    /// The rejected value.
    pub value: u8,
}

impl TryFrom<u8> for DieFace {
    type Error = FaceError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN.0..=Self::MAX.0).contains(&value) {
            Ok(DieFace(value))
        } else {
            Err(FaceError { value })
        }
    }
}

impl From<DieFace> for u8 {
    fn from(face: DieFace) -> Self {
        face.0
    }
}
