//! Short public identifiers for channels and threads.
//!
//! Ids are drawn in application code, inside the same transaction as the
//! insert that uses them, so the uniqueness check and the insert cannot
//! be split.

use rand::Rng;
use rusqlite::Connection;

use crate::{DbError, DbResult};

pub const URL_ID_LEN: usize = 8;
pub const URL_ID_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Collision retries before giving up. With 62^8 possible values a collision
/// is already vanishingly rare; hitting the bound means something is wrong.
pub const MAX_ATTEMPTS: usize = 10;

/// Generates a fresh 8-character alphanumeric id that does not yet exist in
/// `table.column`. Call inside the transaction that inserts the row.
pub fn generate_url_id(conn: &Connection, table: &str, column: &str) -> DbResult<String> {
    generate_with(conn, table, column, URL_ID_ALPHABET, URL_ID_LEN, MAX_ATTEMPTS)
}

pub(crate) fn generate_with(
    conn: &Connection,
    table: &str,
    column: &str,
    alphabet: &[u8],
    len: usize,
    max_attempts: usize,
) -> DbResult<String> {
    // table/column are compile-time constants at every call site, never
    // user input, so formatting them into the SQL is safe.
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE {column} = ?1)");

    for _ in 0..max_attempts {
        let candidate = random_id(alphabet, len);
        let taken: bool = conn.query_row(&sql, [&candidate], |row| row.get(0))?;
        if !taken {
            return Ok(candidate);
        }
    }

    Err(DbError::internal(format!(
        "exhausted {max_attempts} attempts generating a unique id for {table}.{column}"
    )))
}

fn random_id(alphabet: &[u8], len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn scratch_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute_batch("CREATE TABLE scratch (code TEXT UNIQUE)")?;
            Ok(())
        })
        .unwrap();
        db
    }

    #[test]
    fn generated_ids_are_well_formed_and_unique() {
        let db = scratch_db();
        db.with_conn(|conn| {
            for _ in 0..200 {
                let id = generate_url_id(conn, "scratch", "code")?;
                assert_eq!(id.len(), URL_ID_LEN);
                assert!(id.bytes().all(|b| b.is_ascii_alphanumeric()));
                // Inserting reserves the id, so a later duplicate would fail
                // the UNIQUE constraint.
                conn.execute("INSERT INTO scratch (code) VALUES (?1)", [&id])?;
            }
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn exhausted_retry_bound_fails_explicitly() {
        let db = scratch_db();
        db.with_conn(|conn| {
            // Tiny id space: two possible values, both taken.
            conn.execute("INSERT INTO scratch (code) VALUES ('a')", [])?;
            conn.execute("INSERT INTO scratch (code) VALUES ('b')", [])?;

            let result = generate_with(conn, "scratch", "code", b"ab", 1, 20);
            match result {
                Err(DbError::Internal(msg)) => assert!(msg.contains("exhausted")),
                other => panic!("expected exhaustion error, got {other:?}"),
            }
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn succeeds_when_a_free_id_remains() {
        let db = scratch_db();
        db.with_conn(|conn| {
            conn.execute("INSERT INTO scratch (code) VALUES ('a')", [])?;

            // Only 'b' is free; with enough attempts it must be found.
            let id = generate_with(conn, "scratch", "code", b"ab", 1, 100)?;
            assert_eq!(id, "b");
            Ok(())
        })
        .unwrap();
    }
}
