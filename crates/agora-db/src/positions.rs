//! Dense ordering for categories, channels, and friend categories.
//!
//! Positions within a scope are always the sequence 0..N-1. The sibling
//! list is resequenced inside the same transaction as the insert, move,
//! or delete that disturbed it.

use rusqlite::Connection;

use crate::DbResult;

/// One ordering scope: the set of rows that share a position sequence.
pub(crate) enum Scope {
    Categories { room_id: i64 },
    Channels { room_id: i64, category_id: Option<i64> },
    FriendCategories { user_id: i64 },
}

impl Scope {
    fn update_sql(&self) -> &'static str {
        match self {
            Scope::Categories { .. } => {
                "UPDATE channel_categories SET position = ?1 WHERE id = ?2"
            }
            Scope::Channels { .. } => "UPDATE channels SET position = ?1 WHERE id = ?2",
            Scope::FriendCategories { .. } => {
                "UPDATE friend_categories SET position = ?1 WHERE id = ?2"
            }
        }
    }

    /// Sibling ids ordered by current position, ties broken by id.
    fn load_siblings(&self, conn: &Connection) -> DbResult<Vec<i64>> {
        match self {
            Scope::Categories { room_id } => {
                let mut stmt = conn.prepare(
                    "SELECT id FROM channel_categories WHERE room_id = ?1 ORDER BY position, id",
                )?;
                let ids = stmt
                    .query_map([room_id], |row| row.get(0))?
                    .collect::<Result<Vec<i64>, _>>()?;
                Ok(ids)
            }
            Scope::Channels { room_id, category_id } => {
                let mut stmt = conn.prepare(
                    "SELECT id FROM channels WHERE room_id = ?1 AND category_id IS ?2
                     ORDER BY position, id",
                )?;
                let ids = stmt
                    .query_map((room_id, category_id), |row| row.get(0))?
                    .collect::<Result<Vec<i64>, _>>()?;
                Ok(ids)
            }
            Scope::FriendCategories { user_id } => {
                let mut stmt = conn.prepare(
                    "SELECT id FROM friend_categories WHERE user_id = ?1 ORDER BY position, id",
                )?;
                let ids = stmt
                    .query_map([user_id], |row| row.get(0))?
                    .collect::<Result<Vec<i64>, _>>()?;
                Ok(ids)
            }
        }
    }
}

/// Places `id` (already inserted) at `requested` within its scope and
/// rewrites the whole scope to 0..N-1. Out-of-range or absent positions
/// append. Returns the position actually assigned.
pub(crate) fn place(
    conn: &Connection,
    scope: &Scope,
    id: i64,
    requested: Option<i64>,
) -> DbResult<i64> {
    let mut ids = scope.load_siblings(conn)?;
    ids.retain(|&sibling| sibling != id);

    let index = match requested {
        Some(p) if p >= 0 && (p as usize) <= ids.len() => p as usize,
        _ => ids.len(),
    };
    ids.insert(index, id);

    write_back(conn, scope, &ids)?;
    Ok(index as i64)
}

/// Closes gaps after a delete or detach.
pub(crate) fn compact(conn: &Connection, scope: &Scope) -> DbResult<()> {
    let ids = scope.load_siblings(conn)?;
    write_back(conn, scope, &ids)
}

fn write_back(conn: &Connection, scope: &Scope, ids: &[i64]) -> DbResult<()> {
    let mut stmt = conn.prepare(scope.update_sql())?;
    for (position, id) in ids.iter().enumerate() {
        stmt.execute((position as i64, id))?;
    }
    Ok(())
}
