//! Dice sources.
//!
//! The rules never draw randomness themselves; callers inject a
//! [`DiceRoller`] at the one place that produces a roll.

use std::collections::VecDeque;

use parking_lot::Mutex;
use rand::Rng;
use tracing::{debug, instrument, warn};

use crate::DieFace;

/// Source of die faces.
pub trait DiceRoller: Send + Sync {
    /// Produces the next face.
    fn roll(&self) -> DieFace;
}

/// Uniform random roller backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomRoller;

impl DiceRoller for RandomRoller {
    #[instrument(skip(self))]
    fn roll(&self) -> DieFace {
        let value: u8 = rand::thread_rng().gen_range(DieFace::MIN.value()..=DieFace::MAX.value());
        debug!(value, "Rolled die");
        // gen_range stays inside the face range, so the fallback is unreachable
        DieFace::try_from(value).unwrap_or(DieFace::MIN)
    }
}

/// Deterministic roller that replays a fixed sequence of faces.
///
/// Once the script runs out it falls back to a uniform random roll.
#[derive(Debug, Default)]
pub struct ScriptedRoller {
    faces: Mutex<VecDeque<DieFace>>,
}

impl ScriptedRoller {
    /// Creates a roller that yields `faces` in order.
    pub fn new(faces: impl IntoIterator<Item = DieFace>) -> Self {
        Self {
            faces: Mutex::new(faces.into_iter().collect()),
        }
    }

    /// Creates a roller from raw values, skipping anything that is not a face.
    pub fn from_values(values: impl IntoIterator<Item = u8>) -> Self {
        Self::new(values.into_iter().filter_map(|v| DieFace::try_from(v).ok()))
    }

    /// Appends faces to the end of the script.
    pub fn push(&self, faces: impl IntoIterator<Item = DieFace>) {
        self.faces.lock().extend(faces);
    }

    /// Number of scripted faces not yet consumed.
    pub fn remaining(&self) -> usize {
        self.faces.lock().len()
    }
}

impl DiceRoller for ScriptedRoller {
    fn roll(&self) -> DieFace {
        match self.faces.lock().pop_front() {
            Some(face) => face,
            None => {
                warn!("Scripted roller exhausted, rolling randomly");
                RandomRoller.roll()
            }
        }
    }
}
