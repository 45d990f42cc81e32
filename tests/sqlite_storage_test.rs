//! Tests for the SQLite storage backend.

use std::sync::Arc;

use chrono::Utc;
use diesel::Connection;
use diesel::SqliteConnection;
use diesel_migrations::MigrationHarness;
use tempfile::NamedTempFile;

use strictly_dice::ScriptedRoller;
use strictly_drinks::{
    DebtLedger, DebtReason, DrinkService, Game, GameStatus, GameStore, MIGRATIONS, NewDebt,
    SessionStore, SqliteStorage, Storage, StoreError,
};

/// Creates a temporary database file and opens storage on it. The file
/// handle must stay in scope to keep the file alive.
fn setup_test_db() -> (NamedTempFile, SqliteStorage) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();
    let storage = SqliteStorage::open(&db_path).expect("Failed to open storage");
    (db_file, storage)
}

fn game(id: &str, channel: &str) -> Game {
    Game::new(
        id.to_string(),
        channel.to_string(),
        "amy".to_string(),
        "Amy".to_string(),
        "s1".to_string(),
        Utc::now(),
    )
}

fn debt(game_id: &str, to: &str, reason: DebtReason) -> NewDebt {
    NewDebt::new(
        game_id.to_string(),
        "s1".to_string(),
        None,
        to.to_string(),
        reason,
        Utc::now(),
    )
}

#[test]
fn test_migrations_already_applied() {
    let (db, _storage) = setup_test_db();
    let mut conn =
        SqliteConnection::establish(db.path().to_str().expect("Invalid path")).expect("Connect");
    assert!(
        !conn
            .has_pending_migration(MIGRATIONS)
            .expect("Migration check failed")
    );
}

#[test]
fn test_game_round_trip_and_versioning() {
    let (_db, storage) = setup_test_db();
    let mut original = game("g1", "#bar");
    original.join("amy", "Amy").expect("Join failed");

    let saved = storage.save(&original).expect("Insert failed");
    assert_eq!(*saved.version(), 1);

    let loaded = storage
        .get_by_id("g1")
        .expect("Query failed")
        .expect("Game missing");
    assert_eq!(loaded, saved);
    assert_eq!(loaded.participants().len(), 1);

    storage.save(&loaded).expect("Update failed");
    let err = storage.save(&loaded).expect_err("Stale save");
    assert!(matches!(
        err,
        StoreError::StaleVersion {
            expected: 1,
            found: 2,
            ..
        }
    ));

    let mut phantom = game("ghost", "#bar");
    phantom.set_version(3);
    assert!(matches!(
        storage.save(&phantom),
        Err(StoreError::Missing { .. })
    ));
}

#[test]
fn test_latest_game_per_channel() {
    let (_db, storage) = setup_test_db();
    storage.save(&game("g1", "#bar")).expect("Save failed");
    storage.save(&game("g2", "#bar")).expect("Save failed");
    storage.save(&game("g3", "#pub")).expect("Save failed");

    let latest = storage
        .get("#bar")
        .expect("Query failed")
        .expect("Game missing");
    assert_eq!(latest.id(), "g2");
    assert!(storage.get("#nowhere").expect("Query failed").is_none());

    assert!(storage.delete("g2").expect("Delete failed"));
    assert!(!storage.delete("g2").expect("Delete failed"));
    assert_eq!(
        storage
            .get("#bar")
            .expect("Query failed")
            .expect("Game missing")
            .id(),
        "g1"
    );
}

#[test]
fn test_ledger_order_payment_and_archive() {
    let (_db, storage) = setup_test_db();
    let first = storage
        .create_record(debt("g1", "bob", DebtReason::CriticalFail))
        .expect("Create failed");
    let second = storage
        .create_record(debt("g1", "bob", DebtReason::LowestRoll))
        .expect("Create failed");
    storage
        .create_record(debt("g2", "amy", DebtReason::CriticalHit))
        .expect("Create failed");
    assert!(second.sequence() > first.sequence());

    let bob = storage.list_by_player("bob").expect("List failed");
    assert_eq!(
        bob.iter().map(|d| d.id().as_str()).collect::<Vec<_>>(),
        vec![first.id().as_str(), second.id().as_str()]
    );

    let paid = storage
        .mark_paid(first.id(), Utc::now())
        .expect("Pay failed");
    assert!(*paid.paid());
    assert!(paid.paid_timestamp().is_some());
    assert!(matches!(
        storage.mark_paid(first.id(), Utc::now()),
        Err(StoreError::AlreadyPaid(_))
    ));
    assert!(matches!(
        storage.mark_paid("missing", Utc::now()),
        Err(StoreError::Missing { .. })
    ));

    let reloaded = storage.list_by_game("g1").expect("List failed");
    assert!(*reloaded[0].paid());
    assert!(!reloaded[1].paid());

    assert_eq!(storage.archive_by_game("g1").expect("Archive failed"), 2);
    assert!(storage.list_by_game("g1").expect("List failed").is_empty());
    assert_eq!(storage.list_by_session("s1").expect("List failed").len(), 1);
    assert_eq!(storage.delete_by_game("g2").expect("Delete failed"), 1);
}

#[test]
fn test_commit_is_atomic() {
    let (_db, storage) = setup_test_db();
    let saved = storage.save(&game("g1", "#bar")).expect("Save failed");
    let (bumped, records) = storage
        .commit_game(&saved, vec![debt("g1", "bob", DebtReason::LowestRoll)])
        .expect("Commit failed");
    assert_eq!(*bumped.version(), 2);
    assert_eq!(records.len(), 1);

    let err = storage
        .commit_game(&saved, vec![debt("g1", "amy", DebtReason::LowestRoll)])
        .expect_err("Stale commit");
    assert!(matches!(err, StoreError::StaleVersion { .. }));
    assert!(storage.list_by_player("amy").expect("List failed").is_empty());
}

#[test]
fn test_sessions_switch_atomically() {
    let (_db, storage) = setup_test_db();
    assert!(
        storage
            .get_active_session("#bar")
            .expect("Query failed")
            .is_none()
    );
    let first = storage
        .create_session("#bar", "amy", Utc::now())
        .expect("Create failed");
    let second = storage
        .create_session("#bar", "bob", Utc::now())
        .expect("Create failed");
    let active = storage
        .get_active_session("#bar")
        .expect("Query failed")
        .expect("Session missing");
    assert_eq!(active.id(), second.id());
    assert_ne!(active.id(), first.id());
    assert!(*active.active());
}

#[test]
fn test_state_survives_reopen() {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();

    let game_id = {
        let storage: Arc<dyn Storage> =
            Arc::new(SqliteStorage::open(&db_path).expect("Open failed"));
        let service = DrinkService::new(storage, Arc::new(ScriptedRoller::from_values([1, 3])));
        let game = service.create_game("#bar", "amy", "Amy").expect("Create failed");
        service.join_game(game.id(), "amy", "Amy").expect("Join failed");
        service.join_game(game.id(), "bob", "Bob").expect("Join failed");
        service.begin_game(game.id()).expect("Begin failed");
        service.roll_dice(game.id(), "amy").expect("Roll failed");
        game.id().clone()
    };

    let storage = SqliteStorage::open(&db_path).expect("Reopen failed");
    let game = storage
        .get_by_id(&game_id)
        .expect("Query failed")
        .expect("Game missing");
    assert_eq!(*game.status(), GameStatus::Active);
    assert!(game.participant("amy").expect("amy").has_rolled());
    assert_eq!(storage.list_by_player("amy").expect("List failed").len(), 1);
}
