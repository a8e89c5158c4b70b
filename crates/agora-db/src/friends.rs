//! Friend requests, the accepted-friendship graph, and the direct-message
//! rooms provisioned when a request is accepted.

use rusqlite::{Connection, OptionalExtension, Transaction};

use crate::channels::insert_channel;
use crate::error::constraint_to_conflict;
use crate::ids::generate_url_id;
use crate::models::{FriendCategoryMemberRow, FriendCategoryRow, FriendRequestRow, FriendRow};
use crate::positions::{self, Scope};
use crate::{Database, DbError, DbResult};

/// Deterministic slug for the DM room between two users. Sorting the pair
/// makes the slug an idempotency key: lookup and creation agree no matter
/// which side initiates.
pub fn dm_room_slug(a: i64, b: i64) -> String {
    format!("dm-{}-{}", a.min(b), a.max(b))
}

impl Database {
    pub fn send_friend_request(&self, sender_id: i64, receiver_id: i64) -> DbResult<i64> {
        if sender_id == receiver_id {
            return Err(DbError::validation(
                "Cannot send a friend request to yourself",
            ));
        }

        self.with_tx(|tx| {
            let receiver_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
                [receiver_id],
                |row| row.get(0),
            )?;
            if !receiver_exists {
                return Err(DbError::not_found("User not found"));
            }

            let existing: bool = tx.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM friendships
                     WHERE (user_id = ?1 AND friend_id = ?2)
                        OR (user_id = ?2 AND friend_id = ?1)
                 )",
                (sender_id, receiver_id),
                |row| row.get(0),
            )?;
            if existing {
                return Err(DbError::conflict(
                    "A friendship or pending request already exists",
                ));
            }

            tx.execute(
                "INSERT INTO friendships (user_id, friend_id, status) VALUES (?1, ?2, 'pending')",
                (sender_id, receiver_id),
            )?;
            Ok(tx.last_insert_rowid())
        })
    }

    /// Incoming pending requests for `user_id`.
    pub fn list_friend_requests(&self, user_id: i64) -> DbResult<Vec<FriendRequestRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT f.id, f.user_id, u.email, f.created_at
                 FROM friendships f
                 JOIN users u ON u.id = f.user_id
                 WHERE f.friend_id = ?1 AND f.status = 'pending'
                 ORDER BY f.created_at DESC, f.id DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(FriendRequestRow {
                        id: row.get(0)?,
                        sender_id: row.get(1)?,
                        sender_email: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Accepting flips the pending row, upserts the reciprocal row, and
    /// provisions the pair's DM room if it does not exist yet, all in one
    /// transaction. Rejecting deletes the pending row. Returns the DM room
    /// id on accept.
    pub fn respond_to_friend_request(
        &self,
        request_id: i64,
        user_id: i64,
        accept: bool,
    ) -> DbResult<Option<i64>> {
        self.with_tx(|tx| {
            let sender: Option<i64> = tx
                .query_row(
                    "SELECT user_id FROM friendships
                     WHERE id = ?1 AND friend_id = ?2 AND status = 'pending'",
                    (request_id, user_id),
                    |row| row.get(0),
                )
                .optional()?;
            let Some(sender_id) = sender else {
                return Err(DbError::not_found("Friend request not found"));
            };

            if !accept {
                tx.execute("DELETE FROM friendships WHERE id = ?1", [request_id])?;
                return Ok(None);
            }

            tx.execute(
                "UPDATE friendships SET status = 'accepted', updated_at = datetime('now')
                 WHERE id = ?1",
                [request_id],
            )?;
            tx.execute(
                "INSERT INTO friendships (user_id, friend_id, status)
                 VALUES (?1, ?2, 'accepted')
                 ON CONFLICT(user_id, friend_id)
                 DO UPDATE SET status = 'accepted', updated_at = datetime('now')",
                (user_id, sender_id),
            )?;

            let room_id = ensure_dm_room(tx, user_id, sender_id)?;
            Ok(Some(room_id))
        })
    }

    /// Accepted friends with their DM room, resolved through the
    /// deterministic slug.
    pub fn list_friends(&self, user_id: i64) -> DbResult<Vec<FriendRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.email, f.status, r.id, r.url_name
                 FROM friendships f
                 JOIN users u ON u.id = f.friend_id
                 LEFT JOIN rooms r ON r.url_name =
                     'dm-' || min(f.user_id, f.friend_id) || '-' || max(f.user_id, f.friend_id)
                 WHERE f.user_id = ?1 AND f.status = 'accepted'
                 ORDER BY u.email",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(FriendRow {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        status: row.get(2)?,
                        room_id: row.get(3)?,
                        room_url: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Looks up the DM room for a pair, in either argument order. Both users
    /// must actually be members.
    pub fn find_dm_room(&self, user_a: i64, user_b: i64) -> DbResult<Option<(i64, String)>> {
        self.with_conn(|conn| {
            let slug = dm_room_slug(user_a, user_b);
            let row = conn
                .query_row(
                    "SELECT r.id, r.url_name FROM rooms r
                     WHERE r.url_name = ?1
                       AND EXISTS (SELECT 1 FROM room_members rm
                                   WHERE rm.room_id = r.id AND rm.user_id = ?2)
                       AND EXISTS (SELECT 1 FROM room_members rm
                                   WHERE rm.room_id = r.id AND rm.user_id = ?3)",
                    (&slug, user_a, user_b),
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Friend categories --

    pub fn create_friend_category(
        &self,
        user_id: i64,
        name: &str,
        position: Option<i64>,
    ) -> DbResult<i64> {
        self.with_tx(|tx| {
            constraint_to_conflict(
                tx.execute(
                    "INSERT INTO friend_categories (user_id, name, position) VALUES (?1, ?2, ?3)",
                    (user_id, name, i64::MAX),
                ),
                "A friend category with this name already exists",
            )?;
            let category_id = tx.last_insert_rowid();
            positions::place(tx, &Scope::FriendCategories { user_id }, category_id, position)?;
            Ok(category_id)
        })
    }

    #[allow(clippy::type_complexity)]
    pub fn list_friend_categories(
        &self,
        user_id: i64,
    ) -> DbResult<Vec<(FriendCategoryRow, Vec<FriendCategoryMemberRow>)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, position FROM friend_categories
                 WHERE user_id = ?1 ORDER BY position, id",
            )?;
            let categories = stmt
                .query_map([user_id], |row| {
                    Ok(FriendCategoryRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        position: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut stmt = conn.prepare(
                "SELECT m.category_id, m.friend_id, u.email
                 FROM friend_category_members m
                 JOIN friend_categories fc ON fc.id = m.category_id
                 JOIN users u ON u.id = m.friend_id
                 WHERE fc.user_id = ?1
                 ORDER BY u.email",
            )?;
            let members = stmt
                .query_map([user_id], |row| {
                    Ok(FriendCategoryMemberRow {
                        category_id: row.get(0)?,
                        friend_id: row.get(1)?,
                        email: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let grouped = categories
                .into_iter()
                .map(|category| {
                    let mine: Vec<FriendCategoryMemberRow> = members
                        .iter()
                        .filter(|m| m.category_id == category.id)
                        .map(|m| FriendCategoryMemberRow {
                            category_id: m.category_id,
                            friend_id: m.friend_id,
                            email: m.email.clone(),
                        })
                        .collect();
                    (category, mine)
                })
                .collect();

            Ok(grouped)
        })
    }

    pub fn delete_friend_category(&self, category_id: i64, user_id: i64) -> DbResult<()> {
        self.with_tx(|tx| {
            let owned: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM friend_categories WHERE id = ?1 AND user_id = ?2)",
                (category_id, user_id),
                |row| row.get(0),
            )?;
            if !owned {
                return Err(DbError::not_found("Friend category not found"));
            }

            tx.execute("DELETE FROM friend_categories WHERE id = ?1", [category_id])?;
            positions::compact(tx, &Scope::FriendCategories { user_id })?;
            Ok(())
        })
    }

    pub fn add_friend_to_category(
        &self,
        category_id: i64,
        friend_id: i64,
        user_id: i64,
    ) -> DbResult<()> {
        self.with_tx(|tx| {
            let owned: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM friend_categories WHERE id = ?1 AND user_id = ?2)",
                (category_id, user_id),
                |row| row.get(0),
            )?;
            if !owned {
                return Err(DbError::not_found("Friend category not found"));
            }

            let accepted: bool = tx.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM friendships
                     WHERE user_id = ?1 AND friend_id = ?2 AND status = 'accepted'
                 )",
                (user_id, friend_id),
                |row| row.get(0),
            )?;
            if !accepted {
                return Err(DbError::validation("User is not an accepted friend"));
            }

            tx.execute(
                "INSERT OR IGNORE INTO friend_category_members (category_id, friend_id)
                 VALUES (?1, ?2)",
                (category_id, friend_id),
            )?;
            Ok(())
        })
    }
}

/// Finds or provisions the DM room for a pair: hidden room under the sorted
/// slug, a Messages category, a default channel, and a welcome thread whose
/// opening post is system-authored, with both users as admins. Keyed by the
/// slug, so repeat invocations return the existing room.
pub(crate) fn ensure_dm_room(tx: &Transaction, user_a: i64, user_b: i64) -> DbResult<i64> {
    let slug = dm_room_slug(user_a, user_b);

    let existing: Option<i64> = tx
        .query_row("SELECT id FROM rooms WHERE url_name = ?1", [&slug], |row| {
            row.get(0)
        })
        .optional()?;
    if let Some(room_id) = existing {
        return Ok(room_id);
    }

    tx.execute(
        "INSERT INTO rooms (name, url_name, description, is_public, is_hidden,
                            allow_anonymous, allow_user_threads)
         VALUES (?1, ?1, 'Direct messages', 0, 1, 0, 1)",
        [&slug],
    )?;
    let room_id = tx.last_insert_rowid();

    tx.execute(
        "INSERT INTO room_members (room_id, user_id, is_admin) VALUES (?1, ?2, 1), (?1, ?3, 1)",
        (room_id, user_a, user_b),
    )?;

    tx.execute(
        "INSERT INTO channel_categories (room_id, name, position) VALUES (?1, 'Messages', 0)",
        [room_id],
    )?;
    let category_id = tx.last_insert_rowid();

    let (channel_id, _) = insert_channel(
        tx,
        room_id,
        Some(category_id),
        "messages",
        Some("Direct messages"),
        false,
        None,
    )?;

    let url_id = generate_url_id(tx, "threads", "url_id")?;
    tx.execute(
        "INSERT INTO threads (channel_id, url_id, subject) VALUES (?1, ?2, 'Welcome')",
        (channel_id, &url_id),
    )?;
    let thread_id = tx.last_insert_rowid();

    // System-authored opening post: author_id stays NULL.
    tx.execute(
        "INSERT INTO posts (thread_id, content)
         VALUES (?1, 'You are now friends. Say hello!')",
        [thread_id],
    )?;

    Ok(room_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn db_with_pair() -> (Database, i64, i64) {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user("alice@example.com", "hash").unwrap();
        let bob = db.create_user("bob@example.com", "hash").unwrap();
        (db, alice, bob)
    }

    #[test]
    fn slug_is_order_independent() {
        assert_eq!(dm_room_slug(7, 3), "dm-3-7");
        assert_eq!(dm_room_slug(3, 7), "dm-3-7");
    }

    #[test]
    fn self_request_is_invalid() {
        let (db, alice, _) = db_with_pair();
        let err = db.send_friend_request(alice, alice).unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[test]
    fn duplicate_request_in_either_direction_conflicts() {
        let (db, alice, bob) = db_with_pair();
        db.send_friend_request(alice, bob).unwrap();

        let err = db.send_friend_request(alice, bob).unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
        let err = db.send_friend_request(bob, alice).unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[test]
    fn reject_deletes_the_pending_row() {
        let (db, alice, bob) = db_with_pair();
        let request = db.send_friend_request(alice, bob).unwrap();

        db.respond_to_friend_request(request, bob, false).unwrap();

        let rows: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM friendships", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(rows, 0);

        // The pair can start over afterwards.
        db.send_friend_request(bob, alice).unwrap();
    }

    #[test]
    fn only_the_addressee_can_respond() {
        let (db, alice, bob) = db_with_pair();
        let request = db.send_friend_request(alice, bob).unwrap();

        let err = db
            .respond_to_friend_request(request, alice, true)
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[test]
    fn accept_creates_symmetric_rows_and_one_dm_room() {
        let (db, alice, bob) = db_with_pair();
        let request = db.send_friend_request(alice, bob).unwrap();

        let room_id = db
            .respond_to_friend_request(request, bob, true)
            .unwrap()
            .expect("accept provisions a DM room");

        // Both directions accepted.
        let alices = db.list_friends(alice).unwrap();
        let bobs = db.list_friends(bob).unwrap();
        assert_eq!(alices.len(), 1);
        assert_eq!(bobs.len(), 1);
        assert_eq!(alices[0].email, "bob@example.com");
        assert_eq!(bobs[0].email, "alice@example.com");

        // Both see the same room, through the slug.
        assert_eq!(alices[0].room_id, Some(room_id));
        assert_eq!(bobs[0].room_id, Some(room_id));

        // The room is fully furnished: default channel, welcome thread,
        // system post, two admin members.
        db.with_conn(|conn| {
            let members: i64 = conn.query_row(
                "SELECT COUNT(*) FROM room_members WHERE room_id = ?1 AND is_admin = 1",
                [room_id],
                |row| row.get(0),
            )?;
            assert_eq!(members, 2);

            let defaults: i64 = conn.query_row(
                "SELECT COUNT(*) FROM channels WHERE room_id = ?1 AND is_default = 1",
                [room_id],
                |row| row.get(0),
            )?;
            assert_eq!(defaults, 1);

            let author: Option<i64> = conn.query_row(
                "SELECT p.author_id FROM posts p
                 JOIN threads t ON t.id = p.thread_id
                 JOIN channels c ON c.id = t.channel_id
                 WHERE c.room_id = ?1",
                [room_id],
                |row| row.get(0),
            )?;
            assert_eq!(author, None);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn dm_provisioning_is_idempotent() {
        let (db, alice, bob) = db_with_pair();

        let (first, second) = db
            .with_tx(|tx| {
                let first = ensure_dm_room(tx, alice, bob)?;
                let second = ensure_dm_room(tx, bob, alice)?;
                Ok((first, second))
            })
            .unwrap();
        assert_eq!(first, second);

        let rooms: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM rooms WHERE url_name LIKE 'dm-%'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(rooms, 1);
    }

    #[test]
    fn dm_lookup_is_symmetric() {
        let (db, alice, bob) = db_with_pair();
        let request = db.send_friend_request(alice, bob).unwrap();
        let room_id = db
            .respond_to_friend_request(request, bob, true)
            .unwrap()
            .unwrap();

        let ab = db.find_dm_room(alice, bob).unwrap().unwrap();
        let ba = db.find_dm_room(bob, alice).unwrap().unwrap();
        assert_eq!(ab.0, room_id);
        assert_eq!(ba.0, room_id);
        assert_eq!(ab.1, dm_room_slug(alice, bob));
    }

    #[test]
    fn friend_categories_roundtrip() {
        let (db, alice, bob) = db_with_pair();
        let request = db.send_friend_request(alice, bob).unwrap();
        db.respond_to_friend_request(request, bob, true).unwrap();

        let close = db.create_friend_category(alice, "close", None).unwrap();
        db.create_friend_category(alice, "work", None).unwrap();

        let err = db.create_friend_category(alice, "close", None).unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        db.add_friend_to_category(close, bob, alice).unwrap();
        // Adding twice is a no-op.
        db.add_friend_to_category(close, bob, alice).unwrap();

        let listed = db.list_friend_categories(alice).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].0.name, "close");
        assert_eq!(listed[0].0.position, 0);
        assert_eq!(listed[1].0.position, 1);
        assert_eq!(listed[0].1.len(), 1);
        assert_eq!(listed[0].1[0].email, "bob@example.com");

        db.delete_friend_category(close, alice).unwrap();
        let listed = db.list_friend_categories(alice).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0.position, 0);
    }

    #[test]
    fn category_membership_requires_accepted_friendship() {
        let (db, alice, bob) = db_with_pair();
        let category = db.create_friend_category(alice, "close", None).unwrap();

        let err = db.add_friend_to_category(category, bob, alice).unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[test]
    fn foreign_category_is_invisible() {
        let (db, alice, bob) = db_with_pair();
        let category = db.create_friend_category(alice, "close", None).unwrap();

        let err = db.delete_friend_category(category, bob).unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }
}
