pub mod channels;
pub mod error;
pub mod friends;
pub mod ids;
pub mod migrations;
pub mod models;
mod positions;
pub mod rooms;
pub mod threads;
pub mod users;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, Transaction};
use tracing::info;

pub use error::{DbError, DbResult};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, used by the test suites.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Read-only access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&Connection) -> DbResult<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::internal("database lock poisoned"))?;
        f(&conn)
    }

    /// Runs a unit of work inside a transaction: commits on Ok, rolls back
    /// on Err (via drop), and releases the connection on every exit path.
    pub fn with_tx<F, T>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&Transaction) -> DbResult<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| DbError::internal("database lock poisoned"))?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_tx_commits_on_ok() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_user("a@example.com", "hash").unwrap();

        let found = db.get_user_by_id(id).unwrap();
        assert_eq!(found.unwrap().email, "a@example.com");
    }

    #[test]
    fn with_tx_rolls_back_on_err() {
        let db = Database::open_in_memory().unwrap();

        let result: DbResult<()> = db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO users (email, password) VALUES ('b@example.com', 'hash')",
                [],
            )?;
            Err(DbError::validation("forced failure"))
        });
        assert!(result.is_err());

        let found = db.get_user_by_email("b@example.com").unwrap();
        assert!(found.is_none());
    }
}
