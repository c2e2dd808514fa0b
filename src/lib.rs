pub mod chat;
pub mod config;
pub mod identity;
pub mod model;
pub mod personas;
pub mod prayer;
pub mod schema;
pub mod server;
pub mod stats;
pub mod store;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::SqliteConnection;
use dotenvy::dotenv;
use std::env;

use crate::schema::{chat_logs, donation_logs, prayer_tracker, users};

pub fn establish_connection() -> SqliteConnection {
    dotenv().ok();
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set in .env");
    let mut conn = SqliteConnection::establish(&database_url)
        .unwrap_or_else(|_| panic!("Error connecting to {}", database_url));

    // Enable WAL mode to allow concurrent reads during writes, and a timeout to retry locked
    // operations.
    conn.batch_execute(
        "PRAGMA foreign_keys = ON; \
        PRAGMA journal_mode = WAL; \
        PRAGMA synchronous = NORMAL; \
        PRAGMA busy_timeout = 10000;",
    )
    .expect("Failed to set SQLite PRAGMAs");

    conn
}

/// Creates the four collections if they don't exist yet. Idempotent, runs at
/// startup and at the top of every test database, so a fresh checkout needs
/// no migration step.
pub fn init_schema(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    conn.batch_execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY NOT NULL,
            created_at TIMESTAMP NOT NULL
        );
        CREATE TABLE IF NOT EXISTS donation_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            guest_id TEXT NOT NULL,
            shrine_id INTEGER NOT NULL,
            point INTEGER NOT NULL,
            event_type TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL
        );
        CREATE TABLE IF NOT EXISTS chat_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            guest_id TEXT NOT NULL,
            oshigami_id INTEGER NOT NULL,
            user_message TEXT NOT NULL,
            ai_reply TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL
        );
        CREATE TABLE IF NOT EXISTS prayer_tracker (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            guest_id TEXT NOT NULL,
            prayer_date DATE NOT NULL,
            bonus_points INTEGER NOT NULL,
            completed_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL,
            UNIQUE (guest_id, prayer_date)
        );",
    )?;
    Ok(())
}

/// Wipes all four collections. Used by the reset binary; guests are
/// anonymous, so there is nothing to preserve across a reset.
pub fn reset_database(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    conn.transaction(|conn| {
        diesel::delete(prayer_tracker::table).execute(conn)?;
        diesel::delete(chat_logs::table).execute(conn)?;
        diesel::delete(donation_logs::table).execute(conn)?;
        diesel::delete(users::table).execute(conn)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewGuestUser;
    use chrono::Utc;

    fn memory_connection() -> SqliteConnection {
        let mut conn = SqliteConnection::establish(":memory:").expect("in-memory sqlite");
        init_schema(&mut conn).expect("schema init");
        conn
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let mut conn = memory_connection();
        init_schema(&mut conn).expect("second init should be a no-op");

        let count: i64 = users::table.count().get_result(&mut conn).expect("count");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_reset_database_clears_all_tables() {
        let mut conn = memory_connection();

        diesel::insert_into(users::table)
            .values(&NewGuestUser {
                id: "g1".to_string(),
                created_at: Utc::now().naive_utc(),
            })
            .execute(&mut conn)
            .expect("insert user");

        reset_database(&mut conn).expect("reset");

        let count: i64 = users::table.count().get_result(&mut conn).expect("count");
        assert_eq!(count, 0);
    }
}
