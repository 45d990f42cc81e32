//! SQLite persistence for games, the debt ledger and sessions.

mod models;
mod repository;
mod schema; // Diesel generated schema - internal use only

pub use repository::{MIGRATIONS, SqliteStorage};
