//! Storage contract errors.

use derive_more::{Display, Error, From};
use strum::Display as StrumDisplay;

/// Where a backend failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum BackendStage {
    /// Opening the database.
    Connect,
    /// Applying schema migrations.
    Migrate,
    /// Running a query.
    Query,
    /// Encoding or decoding stored JSON.
    Codec,
    /// A stored row holds a value the domain rejects.
    Corrupt,
}

/// A backend failure, tagged with the call site that raised it.
#[derive(Debug, Clone, Display, Error)]
#[display("{stage} failure: {message} at {file}:{line}")]
pub struct BackendError {
    /// Failing stage.
    pub stage: BackendStage,
    /// Underlying message.
    pub message: String,
    /// Raising line.
    pub line: u32,
    /// Raising file.
    pub file: &'static str,
}

impl BackendError {
    /// Records a failure at the caller's location.
    #[track_caller]
    pub fn new(stage: BackendStage, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            stage,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Failure reported by a game store, debt ledger or session store.
#[derive(Debug, Clone, Display, Error, From)]
pub enum StoreError {
    /// The addressed row does not exist.
    #[display("{what} {id} not found")]
    Missing {
        /// Entity kind.
        what: &'static str,
        /// Requested identifier.
        id: String,
    },

    /// A save raced another writer.
    #[display("game {game_id} was modified concurrently (expected version {expected}, found {found})")]
    StaleVersion {
        /// Game being saved.
        game_id: String,
        /// Version the writer loaded.
        expected: u64,
        /// Version currently stored.
        found: u64,
    },

    /// The debt was paid before.
    #[display("debt {_0} is already paid")]
    AlreadyPaid(#[error(not(source))] String),

    /// The backend failed.
    #[from]
    #[display("{_0}")]
    Backend(BackendError),
}

impl StoreError {
    /// Shorthand for [`StoreError::Missing`].
    pub fn missing(what: &'static str, id: impl Into<String>) -> Self {
        Self::Missing {
            what,
            id: id.into(),
        }
    }

    /// Shorthand for a [`StoreError::Backend`] raised at the caller.
    #[track_caller]
    pub fn backend(stage: BackendStage, message: impl Into<String>) -> Self {
        Self::Backend(BackendError::new(stage, message))
    }
}

impl From<diesel::result::Error> for StoreError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        Self::backend(BackendStage::Query, err.to_string())
    }
}

impl From<diesel::ConnectionError> for StoreError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        Self::backend(BackendStage::Connect, err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::backend(BackendStage::Codec, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_records_call_site() {
        let err = StoreError::backend(BackendStage::Migrate, "table exists");
        let StoreError::Backend(backend) = &err else {
            panic!("expected a backend error");
        };
        assert_eq!(backend.stage, BackendStage::Migrate);
        assert!(backend.file.ends_with("error.rs"));
        assert!(err.to_string().starts_with("migrate failure: table exists at "));
    }

    #[test]
    fn test_json_failures_are_codec_stage() {
        let err: StoreError = serde_json::from_str::<u32>("nope")
            .map_err(StoreError::from)
            .expect_err("invalid json");
        assert!(matches!(
            err,
            StoreError::Backend(BackendError {
                stage: BackendStage::Codec,
                ..
            })
        ));
    }
}
