//! SQLite-backed storage for games, debts and sessions.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::db::models::{DebtRow, GameRow, NewDebtRow, NewGameRow, SessionRow};
use crate::db::schema;
use crate::games::drinks::Game;
use crate::ledger::{DebtRecord, NewDebt, Session};
use crate::store::{
    BackendStage, DebtLedger, GameStore, SessionStore, Storage, StoreError, check_version, new_id,
};

/// Schema migrations compiled into the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Storage backed by a single SQLite connection.
///
/// Writes that touch more than one row run inside an immediate transaction,
/// so a game and the debts it produced land together.
pub struct SqliteStorage {
    db_path: String,
    conn: Mutex<SqliteConnection>,
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl SqliteStorage {
    /// Opens the database at `db_path` and applies pending migrations.
    ///
    /// Use `":memory:"` for an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the connection or a migration fails.
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        info!(path = %db_path, "Opening SqliteStorage");
        let mut conn = SqliteConnection::establish(db_path)
            .map_err(|e| {
                StoreError::backend(
                    BackendStage::Connect,
                    format!("Failed to connect to '{}': {}", db_path, e),
                )
            })?;
        diesel::sql_query("PRAGMA busy_timeout = 5000").execute(&mut conn)?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::backend(BackendStage::Migrate, e.to_string()))?;
        debug!(migrations = applied.len(), "Migrations applied");
        Ok(Self {
            db_path: db_path.to_string(),
            conn: Mutex::new(conn),
        })
    }

    /// Path the storage was opened with.
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    fn save_in(conn: &mut SqliteConnection, game: &Game) -> Result<Game, StoreError> {
        use schema::games::dsl;

        let stored = dsl::games
            .filter(dsl::id.eq(game.id().as_str()))
            .select(dsl::version)
            .first::<i64>(conn)
            .optional()?;
        check_version(game, stored.map(|v| v as u64))?;

        let mut saved = game.clone();
        saved.set_version(game.version() + 1);
        let state = serde_json::to_string(&saved)?;
        let version = *saved.version() as i64;
        let now = Utc::now().naive_utc();

        if stored.is_some() {
            diesel::update(dsl::games.filter(dsl::id.eq(game.id().as_str())))
                .set((
                    dsl::status.eq(saved.status().to_string()),
                    dsl::version.eq(version),
                    dsl::state.eq(state.as_str()),
                    dsl::updated_at.eq(now),
                ))
                .execute(conn)?;
        } else {
            let row = NewGameRow::new(
                saved.id().clone(),
                saved.channel_id().clone(),
                saved.status().to_string(),
                version,
                state,
                saved.created_at().naive_utc(),
                now,
            );
            diesel::insert_into(dsl::games).values(&row).execute(conn)?;
        }
        debug!(game_id = %saved.id(), version, status = %saved.status(), "Game saved");
        Ok(saved)
    }

    fn append_in(conn: &mut SqliteConnection, debt: NewDebt) -> Result<DebtRecord, StoreError> {
        let row = NewDebtRow::from_debt(new_id(), debt);
        let stored = diesel::insert_into(schema::debts::table)
            .values(&row)
            .returning(DebtRow::as_returning())
            .get_result(conn)?;
        stored.into_record()
    }

    fn list_where<F>(&self, filter: F) -> Result<Vec<DebtRecord>, StoreError>
    where
        F: FnOnce(
            schema::debts::BoxedQuery<'static, diesel::sqlite::Sqlite>,
        ) -> schema::debts::BoxedQuery<'static, diesel::sqlite::Sqlite>,
    {
        use schema::debts::dsl;

        let mut conn = self.conn.lock();
        let query = dsl::debts
            .filter(dsl::archived.eq(false))
            .order(dsl::seq.asc())
            .into_boxed();
        let rows = filter(query)
            .select(DebtRow::as_select())
            .load::<DebtRow>(&mut *conn)?;
        rows.into_iter()
            .map(DebtRow::into_record)
            .collect()
    }
}

impl GameStore for SqliteStorage {
    #[instrument(skip(self))]
    fn get(&self, channel_id: &str) -> Result<Option<Game>, StoreError> {
        use schema::games::dsl;

        let mut conn = self.conn.lock();
        let row = dsl::games
            .filter(dsl::channel_id.eq(channel_id))
            .order(dsl::seq.desc())
            .select(GameRow::as_select())
            .first::<GameRow>(&mut *conn)
            .optional()?;
        row.map(GameRow::into_game).transpose()
    }

    #[instrument(skip(self))]
    fn get_by_id(&self, game_id: &str) -> Result<Option<Game>, StoreError> {
        use schema::games::dsl;

        let mut conn = self.conn.lock();
        let row = dsl::games
            .filter(dsl::id.eq(game_id))
            .select(GameRow::as_select())
            .first::<GameRow>(&mut *conn)
            .optional()?;
        row.map(GameRow::into_game).transpose()
    }

    #[instrument(skip(self, game), fields(game_id = %game.id()))]
    fn save(&self, game: &Game) -> Result<Game, StoreError> {
        let mut conn = self.conn.lock();
        conn.immediate_transaction(|conn| Self::save_in(conn, game))
    }

    #[instrument(skip(self))]
    fn delete(&self, game_id: &str) -> Result<bool, StoreError> {
        use schema::games::dsl;

        let mut conn = self.conn.lock();
        let removed = diesel::delete(dsl::games.filter(dsl::id.eq(game_id))).execute(&mut *conn)?;
        Ok(removed > 0)
    }
}

impl DebtLedger for SqliteStorage {
    #[instrument(skip(self, debt), fields(game_id = %debt.game_id(), to = %debt.to_player_id()))]
    fn create_record(&self, debt: NewDebt) -> Result<DebtRecord, StoreError> {
        let mut conn = self.conn.lock();
        Self::append_in(&mut conn, debt)
    }

    #[instrument(skip(self))]
    fn mark_paid(&self, debt_id: &str, at: DateTime<Utc>) -> Result<DebtRecord, StoreError> {
        use schema::debts::dsl;

        let mut conn = self.conn.lock();
        conn.immediate_transaction(|conn| {
            let row = dsl::debts
                .filter(dsl::id.eq(debt_id))
                .select(DebtRow::as_select())
                .first::<DebtRow>(conn)
                .optional()?
                .ok_or_else(|| StoreError::missing("debt", debt_id))?;
            let mut record = row.into_record()?;
            if !record.mark_paid(at) {
                return Err(StoreError::AlreadyPaid(debt_id.to_string()));
            }
            diesel::update(dsl::debts.filter(dsl::id.eq(debt_id)))
                .set((dsl::paid.eq(true), dsl::paid_at.eq(Some(at.naive_utc()))))
                .execute(conn)?;
            info!(debt_id, "Debt paid");
            Ok(record)
        })
    }

    fn list_by_game(&self, game_id: &str) -> Result<Vec<DebtRecord>, StoreError> {
        let game_id = game_id.to_string();
        self.list_where(|q| q.filter(schema::debts::game_id.eq(game_id)))
    }

    fn list_by_player(&self, player_id: &str) -> Result<Vec<DebtRecord>, StoreError> {
        let player_id = player_id.to_string();
        self.list_where(|q| q.filter(schema::debts::to_player_id.eq(player_id)))
    }

    fn list_by_session(&self, session_id: &str) -> Result<Vec<DebtRecord>, StoreError> {
        let session_id = session_id.to_string();
        self.list_where(|q| q.filter(schema::debts::session_id.eq(session_id)))
    }

    #[instrument(skip(self))]
    fn archive_by_game(&self, game_id: &str) -> Result<usize, StoreError> {
        use schema::debts::dsl;

        let mut conn = self.conn.lock();
        let archived = diesel::update(
            dsl::debts
                .filter(dsl::game_id.eq(game_id))
                .filter(dsl::archived.eq(false)),
        )
        .set(dsl::archived.eq(true))
        .execute(&mut *conn)?;
        debug!(game_id, archived, "Archived debts");
        Ok(archived)
    }

    #[instrument(skip(self))]
    fn delete_by_game(&self, game_id: &str) -> Result<usize, StoreError> {
        use schema::debts::dsl;

        let mut conn = self.conn.lock();
        Ok(diesel::delete(dsl::debts.filter(dsl::game_id.eq(game_id))).execute(&mut *conn)?)
    }
}

impl SessionStore for SqliteStorage {
    #[instrument(skip(self))]
    fn create_session(
        &self,
        channel_id: &str,
        created_by: &str,
        at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        use schema::sessions::dsl;

        let session = Session::new(
            new_id(),
            channel_id.to_string(),
            at,
            created_by.to_string(),
            true,
        );
        let mut conn = self.conn.lock();
        conn.immediate_transaction(|conn| {
            let deactivated = diesel::update(
                dsl::sessions
                    .filter(dsl::channel_id.eq(channel_id))
                    .filter(dsl::active.eq(true)),
            )
            .set(dsl::active.eq(false))
            .execute(conn)?;
            diesel::insert_into(dsl::sessions)
                .values(&SessionRow::from(&session))
                .execute(conn)?;
            info!(session_id = %session.id(), channel_id, deactivated, "Session created");
            Ok::<_, StoreError>(())
        })?;
        Ok(session)
    }

    #[instrument(skip(self))]
    fn get_active_session(&self, channel_id: &str) -> Result<Option<Session>, StoreError> {
        use schema::sessions::dsl;

        let mut conn = self.conn.lock();
        let row = dsl::sessions
            .filter(dsl::channel_id.eq(channel_id))
            .filter(dsl::active.eq(true))
            .order(dsl::created_at.desc())
            .select(SessionRow::as_select())
            .first::<SessionRow>(&mut *conn)
            .optional()?;
        Ok(row.map(Session::from))
    }
}

impl Storage for SqliteStorage {
    #[instrument(skip(self, game, debts), fields(game_id = %game.id(), debts = debts.len()))]
    fn commit_game(
        &self,
        game: &Game,
        debts: Vec<NewDebt>,
    ) -> Result<(Game, Vec<DebtRecord>), StoreError> {
        let mut conn = self.conn.lock();
        conn.immediate_transaction(|conn| {
            let saved = Self::save_in(conn, game)?;
            let records = debts
                .into_iter()
                .map(|debt| Self::append_in(conn, debt))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((saved, records))
        })
    }
}
