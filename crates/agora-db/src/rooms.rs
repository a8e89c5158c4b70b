use rusqlite::{Connection, OptionalExtension};

use crate::error::constraint_to_conflict;
use crate::models::{RoomRow, UserRoomRow};
use crate::{Database, DbError, DbResult};

/// Field set for a room insert. Booleans arrive as multipart form strings
/// and are coerced by the API layer before this struct is built.
pub struct NewRoom {
    pub name: String,
    pub url_name: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_public: bool,
    pub is_hidden: bool,
    pub is_nsfw: bool,
    pub allow_anonymous: bool,
    pub allow_user_threads: bool,
    pub allow_accountless: bool,
    pub thread_limit: Option<i64>,
    pub posts_per_thread: Option<i64>,
}

impl Database {
    /// Inserts the room and the creator's admin membership in one
    /// transaction, so a room can never exist without its admin.
    pub fn create_room(&self, creator_id: i64, room: &NewRoom) -> DbResult<i64> {
        self.with_tx(|tx| {
            constraint_to_conflict(
                tx.execute(
                    "INSERT INTO rooms (name, url_name, description, thumbnail_url,
                        is_public, is_hidden, is_nsfw, allow_anonymous,
                        allow_user_threads, allow_accountless, thread_limit, posts_per_thread)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    (
                        &room.name,
                        &room.url_name,
                        &room.description,
                        &room.thumbnail_url,
                        room.is_public,
                        room.is_hidden,
                        room.is_nsfw,
                        room.allow_anonymous,
                        room.allow_user_threads,
                        room.allow_accountless,
                        room.thread_limit,
                        room.posts_per_thread,
                    ),
                ),
                "A room with this URL already exists",
            )?;
            let room_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO room_members (room_id, user_id, is_admin) VALUES (?1, ?2, 1)",
                (room_id, creator_id),
            )?;

            Ok(room_id)
        })
    }

    pub fn join_room(&self, room_id: i64, user_id: i64) -> DbResult<()> {
        self.with_tx(|tx| {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM rooms WHERE id = ?1)",
                [room_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(DbError::not_found("Room not found"));
            }

            if find_member(tx, room_id, user_id)?.is_some() {
                return Err(DbError::conflict("Already a member of this room"));
            }

            tx.execute(
                "INSERT INTO room_members (room_id, user_id) VALUES (?1, ?2)",
                (room_id, user_id),
            )?;
            Ok(())
        })
    }

    /// Removes the caller's membership; when the room empties out it is
    /// destroyed inside the same transaction, so a memberless room never
    /// survives. Returns the orphaned thumbnail URL for the caller to
    /// unlink best-effort.
    pub fn leave_room(&self, room_id: i64, user_id: i64) -> DbResult<Option<String>> {
        self.with_tx(|tx| {
            tx.execute(
                "DELETE FROM room_members WHERE room_id = ?1 AND user_id = ?2",
                (room_id, user_id),
            )?;

            let remaining: i64 = tx.query_row(
                "SELECT COUNT(*) FROM room_members WHERE room_id = ?1",
                [room_id],
                |row| row.get(0),
            )?;

            if remaining == 0 {
                destroy_room(tx, room_id)
            } else {
                Ok(None)
            }
        })
    }

    /// Admin-only explicit destruction. Returns the thumbnail URL to unlink.
    pub fn delete_room(&self, room_id: i64, user_id: i64) -> DbResult<Option<String>> {
        self.with_tx(|tx| {
            require_admin(tx, room_id, user_id, "Not authorized to delete room")?;
            destroy_room(tx, room_id)
        })
    }

    pub fn get_user_rooms(&self, user_id: i64) -> DbResult<Vec<UserRoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.name, r.url_name, r.thumbnail_url, r.created_at, rm.joined_at
                 FROM rooms r
                 INNER JOIN room_members rm ON r.id = rm.room_id
                 WHERE rm.user_id = ?1
                 ORDER BY rm.joined_at DESC, r.id DESC",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(UserRoomRow {
                        room_id: row.get(0)?,
                        name: row.get(1)?,
                        url_name: row.get(2)?,
                        thumbnail_url: row.get(3)?,
                        created_at: row.get(4)?,
                        joined_at: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

/// Deletes members then the room row; SQLite cascades take categories,
/// channels, threads, posts, and attachments. The thumbnail file itself is
/// the caller's problem: database success must not hinge on filesystem state.
pub(crate) fn destroy_room(conn: &Connection, room_id: i64) -> DbResult<Option<String>> {
    let thumbnail: Option<String> = conn
        .query_row(
            "SELECT thumbnail_url FROM rooms WHERE id = ?1",
            [room_id],
            |row| row.get(0),
        )
        .optional()?
        .flatten();

    conn.execute("DELETE FROM room_members WHERE room_id = ?1", [room_id])?;
    conn.execute("DELETE FROM rooms WHERE id = ?1", [room_id])?;

    Ok(thumbnail)
}

/// Membership lookup: None when not a member, Some(is_admin) otherwise.
pub(crate) fn find_member(
    conn: &Connection,
    room_id: i64,
    user_id: i64,
) -> DbResult<Option<bool>> {
    let row = conn
        .query_row(
            "SELECT is_admin FROM room_members WHERE room_id = ?1 AND user_id = ?2",
            (room_id, user_id),
            |row| row.get(0),
        )
        .optional()?;
    Ok(row)
}

/// Admin rights are re-checked inside every mutating transaction rather
/// than cached, so a revoked admin cannot act on stale authority.
pub(crate) fn require_admin(
    conn: &Connection,
    room_id: i64,
    user_id: i64,
    message: &str,
) -> DbResult<()> {
    match find_member(conn, room_id, user_id)? {
        Some(true) => Ok(()),
        _ => Err(DbError::forbidden(message)),
    }
}

pub(crate) fn require_member(conn: &Connection, room_id: i64, user_id: i64) -> DbResult<bool> {
    find_member(conn, room_id, user_id)?
        .ok_or_else(|| DbError::forbidden("User is not a member of this room"))
}

pub(crate) fn load_room(conn: &Connection, room_id: i64) -> DbResult<RoomRow> {
    conn.query_row(
        "SELECT id, name, url_name, description, thumbnail_url, is_public, is_hidden,
                is_nsfw, allow_anonymous, allow_user_threads, allow_accountless,
                thread_limit, posts_per_thread, created_at
         FROM rooms WHERE id = ?1",
        [room_id],
        |row| {
            Ok(RoomRow {
                id: row.get(0)?,
                name: row.get(1)?,
                url_name: row.get(2)?,
                description: row.get(3)?,
                thumbnail_url: row.get(4)?,
                is_public: row.get(5)?,
                is_hidden: row.get(6)?,
                is_nsfw: row.get(7)?,
                allow_anonymous: row.get(8)?,
                allow_user_threads: row.get(9)?,
                allow_accountless: row.get(10)?,
                thread_limit: row.get(11)?,
                posts_per_thread: row.get(12)?,
                created_at: row.get(13)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| DbError::not_found("Room not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbError;

    fn plain_room(name: &str) -> NewRoom {
        NewRoom {
            name: name.to_string(),
            url_name: name.to_string(),
            description: None,
            thumbnail_url: None,
            is_public: true,
            is_hidden: false,
            is_nsfw: false,
            allow_anonymous: true,
            allow_user_threads: true,
            allow_accountless: false,
            thread_limit: None,
            posts_per_thread: None,
        }
    }

    fn count(db: &crate::Database, table: &str) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?)
        })
        .unwrap()
    }

    #[test]
    fn creator_becomes_admin_atomically() {
        let db = crate::Database::open_in_memory().unwrap();
        let alice = db.create_user("alice@example.com", "hash").unwrap();
        let room_id = db.create_room(alice, &plain_room("general")).unwrap();

        let is_admin = db
            .with_conn(|conn| find_member(conn, room_id, alice))
            .unwrap();
        assert_eq!(is_admin, Some(true));
    }

    #[test]
    fn joining_twice_is_a_conflict() {
        let db = crate::Database::open_in_memory().unwrap();
        let alice = db.create_user("alice@example.com", "hash").unwrap();
        let bob = db.create_user("bob@example.com", "hash").unwrap();
        let room_id = db.create_room(alice, &plain_room("general")).unwrap();

        db.join_room(room_id, bob).unwrap();
        let err = db.join_room(room_id, bob).unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[test]
    fn joining_missing_room_is_not_found() {
        let db = crate::Database::open_in_memory().unwrap();
        let alice = db.create_user("alice@example.com", "hash").unwrap();

        let err = db.join_room(999, alice).unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[test]
    fn last_member_leaving_destroys_room_and_dependents() {
        let db = crate::Database::open_in_memory().unwrap();
        let alice = db.create_user("alice@example.com", "hash").unwrap();
        let room_id = db.create_room(alice, &plain_room("doomed")).unwrap();
        let cat = db.create_category(room_id, alice, "main", None).unwrap();
        let (channel_id, _) = db
            .create_channel(room_id, alice, "chat", None, false, cat)
            .unwrap();
        db.create_thread(channel_id, alice, "hello", "first", false, None)
            .unwrap();

        db.leave_room(room_id, alice).unwrap();

        assert_eq!(count(&db, "rooms"), 0);
        assert_eq!(count(&db, "room_members"), 0);
        assert_eq!(count(&db, "channel_categories"), 0);
        assert_eq!(count(&db, "channels"), 0);
        assert_eq!(count(&db, "threads"), 0);
        assert_eq!(count(&db, "posts"), 0);
    }

    #[test]
    fn leaving_with_members_remaining_keeps_the_room() {
        let db = crate::Database::open_in_memory().unwrap();
        let alice = db.create_user("alice@example.com", "hash").unwrap();
        let bob = db.create_user("bob@example.com", "hash").unwrap();
        let room_id = db.create_room(alice, &plain_room("shared")).unwrap();
        db.join_room(room_id, bob).unwrap();

        db.leave_room(room_id, bob).unwrap();

        assert_eq!(count(&db, "rooms"), 1);
        let alice_member = db
            .with_conn(|conn| find_member(conn, room_id, alice))
            .unwrap();
        assert_eq!(alice_member, Some(true));
    }

    #[test]
    fn delete_room_requires_admin() {
        let db = crate::Database::open_in_memory().unwrap();
        let alice = db.create_user("alice@example.com", "hash").unwrap();
        let bob = db.create_user("bob@example.com", "hash").unwrap();
        let room_id = db.create_room(alice, &plain_room("guarded")).unwrap();
        db.join_room(room_id, bob).unwrap();

        let err = db.delete_room(room_id, bob).unwrap_err();
        assert!(matches!(err, DbError::Forbidden(_)));
        assert_eq!(count(&db, "rooms"), 1);

        db.delete_room(room_id, alice).unwrap();
        assert_eq!(count(&db, "rooms"), 0);
    }

    #[test]
    fn destroyed_room_reports_thumbnail_for_cleanup() {
        let db = crate::Database::open_in_memory().unwrap();
        let alice = db.create_user("alice@example.com", "hash").unwrap();
        let mut room = plain_room("pictured");
        room.thumbnail_url = Some("/uploads/thumb.png".to_string());
        let room_id = db.create_room(alice, &room).unwrap();

        let thumb = db.delete_room(room_id, alice).unwrap();
        assert_eq!(thumb.as_deref(), Some("/uploads/thumb.png"));
    }

    #[test]
    fn user_rooms_lists_only_memberships() {
        let db = crate::Database::open_in_memory().unwrap();
        let alice = db.create_user("alice@example.com", "hash").unwrap();
        let bob = db.create_user("bob@example.com", "hash").unwrap();
        db.create_room(alice, &plain_room("a")).unwrap();
        let shared = db.create_room(alice, &plain_room("b")).unwrap();
        db.join_room(shared, bob).unwrap();

        assert_eq!(db.get_user_rooms(alice).unwrap().len(), 2);
        let bobs = db.get_user_rooms(bob).unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].url_name, "b");
    }
}
