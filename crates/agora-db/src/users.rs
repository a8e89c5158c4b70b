use rusqlite::{Connection, OptionalExtension};

use crate::error::constraint_to_conflict;
use crate::models::UserRow;
use crate::{Database, DbResult};

impl Database {
    pub fn create_user(&self, email: &str, password_hash: &str) -> DbResult<i64> {
        self.with_tx(|tx| {
            constraint_to_conflict(
                tx.execute(
                    "INSERT INTO users (email, password) VALUES (?1, ?2)",
                    (email, password_hash),
                ),
                "User already exists",
            )?;
            Ok(tx.last_insert_rowid())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", &email))
    }

    pub fn get_user_by_id(&self, id: i64) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &id))
    }
}

fn query_user(
    conn: &Connection,
    predicate: &str,
    param: &dyn rusqlite::types::ToSql,
) -> DbResult<Option<UserRow>> {
    let sql = format!("SELECT id, email, password, created_at FROM users WHERE {predicate}");
    let row = conn
        .query_row(&sql, [param], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbError};

    #[test]
    fn duplicate_email_is_a_conflict() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("taken@example.com", "hash").unwrap();

        let err = db.create_user("taken@example.com", "hash2").unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[test]
    fn lookup_by_email_and_id_agree() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_user("who@example.com", "hash").unwrap();

        let by_email = db.get_user_by_email("who@example.com").unwrap().unwrap();
        let by_id = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(by_email.id, by_id.id);
        assert_eq!(by_id.email, "who@example.com");
    }
}
