use rusqlite::{Connection, OptionalExtension, Transaction};

use crate::ids::generate_url_id;
use crate::models::{PostRow, ThreadSummaryRow};
use crate::rooms::{load_room, require_member};
use crate::{Database, DbError, DbResult};

/// Metadata for a file uploaded alongside a thread's opening post.
pub struct NewAttachment {
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub file_url: String,
}

enum PostOutcome {
    Created(i64),
    LimitReached,
}

impl Database {
    /// Creates a thread and its opening post (and attachment row, when an
    /// upload accompanied it) in one transaction. The opening post counts
    /// toward the room's posts_per_thread ceiling, so a limit of 1 locks
    /// the thread immediately.
    pub fn create_thread(
        &self,
        channel_id: i64,
        user_id: i64,
        subject: &str,
        content: &str,
        is_anonymous: bool,
        attachment: Option<&NewAttachment>,
    ) -> DbResult<(i64, String)> {
        self.with_tx(|tx| {
            let room_id = channel_room(tx, channel_id)?;
            let is_admin = require_member(tx, room_id, user_id)?;

            let room = load_room(tx, room_id)?;
            if !room.allow_user_threads && !is_admin {
                return Err(DbError::forbidden(
                    "Thread creation is restricted to room admins",
                ));
            }

            let url_id = generate_url_id(tx, "threads", "url_id")?;
            tx.execute(
                "INSERT INTO threads (channel_id, url_id, subject, author_id, is_anonymous)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (channel_id, &url_id, subject, user_id, is_anonymous),
            )?;
            let thread_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO posts (thread_id, author_id, content) VALUES (?1, ?2, ?3)",
                (thread_id, user_id, content),
            )?;
            let post_id = tx.last_insert_rowid();

            if let Some(file) = attachment {
                tx.execute(
                    "INSERT INTO file_attachments (post_id, file_name, file_type, file_size, file_url)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    (post_id, &file.file_name, &file.file_type, file.file_size, &file.file_url),
                )?;
            }

            lock_if_at_limit(tx, thread_id, room.posts_per_thread)?;
            Ok((thread_id, url_id))
        })
    }

    /// Appends a post. The count-vs-limit check and the lock flip run inside
    /// one transaction on the single serialized connection, so two posts
    /// cannot both pass the check: the post that reaches the ceiling lands
    /// and locks the thread, everything after is rejected.
    pub fn create_post(
        &self,
        thread_id: i64,
        user_id: i64,
        content: &str,
        country: Option<(&str, &str)>,
    ) -> DbResult<i64> {
        let outcome = self.with_tx(|tx| {
            let (room_id, is_locked) = thread_state(tx, thread_id)?;
            require_member(tx, room_id, user_id)?;

            if is_locked {
                return Err(DbError::conflict("Thread is locked"));
            }

            let room = load_room(tx, room_id)?;
            if let Some(limit) = room.posts_per_thread {
                let count: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM posts WHERE thread_id = ?1",
                    [thread_id],
                    |row| row.get(0),
                )?;
                // Already at the ceiling (e.g. the limit was lowered after
                // the fact): lock now, keep the lock, reject the post. The
                // lock must commit, so this is not an Err path.
                if count >= limit {
                    lock_thread(tx, thread_id)?;
                    return Ok(PostOutcome::LimitReached);
                }
            }

            let (country_code, country_name) = match country {
                Some((code, name)) => (Some(code), Some(name)),
                None => (None, None),
            };
            tx.execute(
                "INSERT INTO posts (thread_id, author_id, content, country_code, country_name)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (thread_id, user_id, content, country_code, country_name),
            )?;
            let post_id = tx.last_insert_rowid();

            lock_if_at_limit(tx, thread_id, room.posts_per_thread)?;

            tx.execute(
                "UPDATE threads SET last_activity = datetime('now') WHERE id = ?1",
                [thread_id],
            )?;

            Ok(PostOutcome::Created(post_id))
        })?;

        match outcome {
            PostOutcome::Created(id) => Ok(id),
            PostOutcome::LimitReached => Err(DbError::conflict(
                "Post limit reached for this thread",
            )),
        }
    }

    /// Threads in a channel, pinned first, then most recently active.
    pub fn list_threads(
        &self,
        channel_id: i64,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<ThreadSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.id, t.url_id, t.subject,
                        CASE WHEN t.is_anonymous THEN NULL ELSE u.email END,
                        t.created_at, t.is_pinned, t.is_locked, t.last_activity,
                        (SELECT COUNT(*) FROM posts p WHERE p.thread_id = t.id),
                        (SELECT p.content FROM posts p WHERE p.thread_id = t.id
                         ORDER BY p.created_at, p.id LIMIT 1)
                 FROM threads t
                 LEFT JOIN users u ON u.id = t.author_id
                 WHERE t.channel_id = ?1
                 ORDER BY t.is_pinned DESC, t.last_activity DESC, t.id DESC
                 LIMIT ?2 OFFSET ?3",
            )?;

            let rows = stmt
                .query_map((channel_id, limit, offset), |row| {
                    Ok(ThreadSummaryRow {
                        id: row.get(0)?,
                        url_id: row.get(1)?,
                        subject: row.get(2)?,
                        author_email: row.get(3)?,
                        created_at: row.get(4)?,
                        is_pinned: row.get(5)?,
                        is_locked: row.get(6)?,
                        last_activity: row.get(7)?,
                        post_count: row.get(8)?,
                        first_post: row.get(9)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Posts in a thread, oldest first. Author emails are masked for
    /// anonymous threads.
    pub fn list_posts(&self, thread_id: i64, limit: i64, offset: i64) -> DbResult<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.content, p.country_code, p.country_name,
                        CASE WHEN t.is_anonymous THEN NULL ELSE u.email END,
                        p.created_at, p.updated_at
                 FROM posts p
                 JOIN threads t ON t.id = p.thread_id
                 LEFT JOIN users u ON u.id = p.author_id
                 WHERE p.thread_id = ?1
                 ORDER BY p.created_at ASC, p.id ASC
                 LIMIT ?2 OFFSET ?3",
            )?;

            let rows = stmt
                .query_map((thread_id, limit, offset), |row| {
                    Ok(PostRow {
                        id: row.get(0)?,
                        content: row.get(1)?,
                        country_code: row.get(2)?,
                        country_name: row.get(3)?,
                        author_email: row.get(4)?,
                        created_at: row.get(5)?,
                        updated_at: row.get(6)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Allowed for the thread's non-anonymous author or any room admin.
    pub fn delete_thread(&self, thread_id: i64, user_id: i64) -> DbResult<()> {
        self.with_tx(|tx| {
            let row = tx
                .query_row(
                    "SELECT t.author_id, t.is_anonymous, c.room_id
                     FROM threads t
                     JOIN channels c ON c.id = t.channel_id
                     WHERE t.id = ?1",
                    [thread_id],
                    |row| {
                        Ok((
                            row.get::<_, Option<i64>>(0)?,
                            row.get::<_, bool>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    },
                )
                .optional()?;
            let Some((author_id, is_anonymous, room_id)) = row else {
                return Err(DbError::not_found("Thread not found"));
            };

            let is_author = !is_anonymous && author_id == Some(user_id);
            let is_admin = crate::rooms::find_member(tx, room_id, user_id)? == Some(true);
            if !is_author && !is_admin {
                return Err(DbError::forbidden("Not authorized to delete thread"));
            }

            tx.execute("DELETE FROM threads WHERE id = ?1", [thread_id])?;
            Ok(())
        })
    }
}

fn channel_room(conn: &Connection, channel_id: i64) -> DbResult<i64> {
    conn.query_row(
        "SELECT room_id FROM channels WHERE id = ?1",
        [channel_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| DbError::not_found("Channel not found"))
}

fn thread_state(conn: &Connection, thread_id: i64) -> DbResult<(i64, bool)> {
    conn.query_row(
        "SELECT c.room_id, t.is_locked
         FROM threads t
         JOIN channels c ON c.id = t.channel_id
         WHERE t.id = ?1",
        [thread_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?
    .ok_or_else(|| DbError::not_found("Thread not found"))
}

fn lock_thread(conn: &Connection, thread_id: i64) -> DbResult<()> {
    conn.execute(
        "UPDATE threads SET is_locked = 1 WHERE id = ?1",
        [thread_id],
    )?;
    Ok(())
}

/// Locks the thread once its post count reaches the room ceiling, in the
/// same transaction as the insert that got it there.
fn lock_if_at_limit(tx: &Transaction, thread_id: i64, limit: Option<i64>) -> DbResult<()> {
    let Some(limit) = limit else { return Ok(()) };
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM posts WHERE thread_id = ?1",
        [thread_id],
        |row| row.get(0),
    )?;
    if count >= limit {
        lock_thread(tx, thread_id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rooms::NewRoom;
    use crate::Database;

    struct Fixture {
        db: Database,
        admin: i64,
        member: i64,
        room: i64,
        channel: i64,
    }

    fn fixture_with(posts_per_thread: Option<i64>, allow_user_threads: bool) -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let admin = db.create_user("admin@example.com", "hash").unwrap();
        let member = db.create_user("member@example.com", "hash").unwrap();
        let room = db
            .create_room(
                admin,
                &NewRoom {
                    name: "room".into(),
                    url_name: "room".into(),
                    description: None,
                    thumbnail_url: None,
                    is_public: true,
                    is_hidden: false,
                    is_nsfw: false,
                    allow_anonymous: true,
                    allow_user_threads,
                    allow_accountless: false,
                    thread_limit: None,
                    posts_per_thread,
                },
            )
            .unwrap();
        db.join_room(room, member).unwrap();
        let category = db.create_category(room, admin, "main", None).unwrap();
        let (channel, _) = db
            .create_channel(room, admin, "general", None, false, category)
            .unwrap();
        Fixture { db, admin, member, room, channel }
    }

    fn fixture() -> Fixture {
        fixture_with(None, true)
    }

    fn post_count(f: &Fixture, thread_id: i64) -> i64 {
        f.db.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM posts WHERE thread_id = ?1",
                [thread_id],
                |row| row.get(0),
            )?)
        })
        .unwrap()
    }

    fn is_locked(f: &Fixture, thread_id: i64) -> bool {
        f.db.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT is_locked FROM threads WHERE id = ?1",
                [thread_id],
                |row| row.get(0),
            )?)
        })
        .unwrap()
    }

    #[test]
    fn thread_gets_opening_post_and_url_id() {
        let f = fixture();
        let (thread, url_id) = f
            .db
            .create_thread(f.channel, f.member, "hello", "first post", false, None)
            .unwrap();

        assert_eq!(url_id.len(), 8);
        assert_eq!(post_count(&f, thread), 1);

        let threads = f.db.list_threads(f.channel, 20, 0).unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].post_count, 1);
        assert_eq!(threads[0].first_post.as_deref(), Some("first post"));
        assert_eq!(threads[0].author_email.as_deref(), Some("member@example.com"));
    }

    #[test]
    fn non_member_cannot_create_thread_or_post() {
        let f = fixture();
        let stranger = f.db.create_user("x@example.com", "hash").unwrap();
        let err = f
            .db
            .create_thread(f.channel, stranger, "hi", "body", false, None)
            .unwrap_err();
        assert!(matches!(err, DbError::Forbidden(_)));

        let (thread, _) = f
            .db
            .create_thread(f.channel, f.member, "hi", "body", false, None)
            .unwrap();
        let err = f.db.create_post(thread, stranger, "reply", None).unwrap_err();
        assert!(matches!(err, DbError::Forbidden(_)));
    }

    #[test]
    fn user_threads_can_be_restricted_to_admins() {
        let f = fixture_with(None, false);
        let err = f
            .db
            .create_thread(f.channel, f.member, "hi", "body", false, None)
            .unwrap_err();
        assert!(matches!(err, DbError::Forbidden(_)));

        // Admins are exempt.
        f.db.create_thread(f.channel, f.admin, "hi", "body", false, None)
            .unwrap();
    }

    #[test]
    fn limit_of_one_locks_thread_at_creation() {
        let f = fixture_with(Some(1), true);
        let (thread, _) = f
            .db
            .create_thread(f.channel, f.member, "solo", "only post", false, None)
            .unwrap();

        assert!(is_locked(&f, thread));

        let err = f.db.create_post(thread, f.member, "too late", None).unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
        assert_eq!(post_count(&f, thread), 1);
    }

    #[test]
    fn post_reaching_limit_succeeds_and_locks() {
        let f = fixture_with(Some(2), true);
        let (thread, _) = f
            .db
            .create_thread(f.channel, f.member, "pair", "one", false, None)
            .unwrap();
        assert!(!is_locked(&f, thread));

        // Second post hits the ceiling: it lands and the thread locks.
        f.db.create_post(thread, f.admin, "two", None).unwrap();
        assert!(is_locked(&f, thread));
        assert_eq!(post_count(&f, thread), 2);

        let err = f.db.create_post(thread, f.member, "three", None).unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
        assert_eq!(post_count(&f, thread), 2);
    }

    #[test]
    fn lock_survives_rejection_when_limit_was_lowered() {
        let f = fixture_with(None, true);
        let (thread, _) = f
            .db
            .create_thread(f.channel, f.member, "t", "one", false, None)
            .unwrap();
        f.db.create_post(thread, f.member, "two", None).unwrap();

        // Tighten the limit below the current count.
        f.db.with_conn(|conn| {
            conn.execute("UPDATE rooms SET posts_per_thread = 1 WHERE id = ?1", [f.room])?;
            Ok(())
        })
        .unwrap();

        let err = f.db.create_post(thread, f.member, "three", None).unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
        // The rejection committed the lock.
        assert!(is_locked(&f, thread));
        assert_eq!(post_count(&f, thread), 2);
    }

    #[test]
    fn posting_bumps_last_activity() {
        let f = fixture();
        let (thread, _) = f
            .db
            .create_thread(f.channel, f.member, "t", "one", false, None)
            .unwrap();

        // Backdate, then post.
        f.db.with_conn(|conn| {
            conn.execute(
                "UPDATE threads SET last_activity = '2000-01-01 00:00:00' WHERE id = ?1",
                [thread],
            )?;
            Ok(())
        })
        .unwrap();
        f.db.create_post(thread, f.member, "two", None).unwrap();

        let threads = f.db.list_threads(f.channel, 20, 0).unwrap();
        assert!(threads[0].last_activity > "2000-01-01 00:00:00".to_string());
    }

    #[test]
    fn anonymous_thread_masks_author() {
        let f = fixture();
        let (thread, _) = f
            .db
            .create_thread(f.channel, f.member, "anon", "hidden", true, None)
            .unwrap();

        let threads = f.db.list_threads(f.channel, 20, 0).unwrap();
        assert_eq!(threads[0].author_email, None);

        let posts = f.db.list_posts(thread, 50, 0).unwrap();
        assert_eq!(posts[0].author_email, None);
    }

    #[test]
    fn attachment_row_written_with_opening_post() {
        let f = fixture();
        let attachment = NewAttachment {
            file_name: "cat.png".into(),
            file_type: "image/png".into(),
            file_size: 1234,
            file_url: "/uploads/cat.png".into(),
        };
        f.db.create_thread(f.channel, f.member, "pics", "look", false, Some(&attachment))
            .unwrap();

        let count: i64 =
            f.db.with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM file_attachments", [], |row| {
                    row.get(0)
                })?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn delete_thread_rules() {
        let f = fixture();
        let (thread, _) = f
            .db
            .create_thread(f.channel, f.member, "t", "one", false, None)
            .unwrap();

        let stranger = f.db.create_user("x@example.com", "hash").unwrap();
        let err = f.db.delete_thread(thread, stranger).unwrap_err();
        assert!(matches!(err, DbError::Forbidden(_)));

        // Author can delete their own thread.
        f.db.delete_thread(thread, f.member).unwrap();

        // Admin can delete someone else's thread; cascade removes posts.
        let (thread, _) = f
            .db
            .create_thread(f.channel, f.member, "t2", "one", false, None)
            .unwrap();
        f.db.delete_thread(thread, f.admin).unwrap();
        assert_eq!(post_count(&f, thread), 0);
    }

    #[test]
    fn anonymous_author_cannot_self_delete() {
        let f = fixture();
        let (thread, _) = f
            .db
            .create_thread(f.channel, f.member, "anon", "one", true, None)
            .unwrap();

        let err = f.db.delete_thread(thread, f.member).unwrap_err();
        assert!(matches!(err, DbError::Forbidden(_)));
    }
}
