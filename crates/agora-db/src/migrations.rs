use rusqlite::Connection;
use tracing::info;

use crate::DbResult;

pub fn run(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS rooms (
            id                  INTEGER PRIMARY KEY,
            name                TEXT NOT NULL,
            url_name            TEXT NOT NULL UNIQUE,
            description         TEXT,
            thumbnail_url       TEXT,
            is_public           INTEGER NOT NULL DEFAULT 0,
            is_hidden           INTEGER NOT NULL DEFAULT 0,
            is_nsfw             INTEGER NOT NULL DEFAULT 0,
            allow_anonymous     INTEGER NOT NULL DEFAULT 1,
            allow_user_threads  INTEGER NOT NULL DEFAULT 1,
            allow_accountless   INTEGER NOT NULL DEFAULT 0,
            thread_limit        INTEGER,
            posts_per_thread    INTEGER,
            created_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS room_members (
            room_id     INTEGER NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
            user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            is_admin    INTEGER NOT NULL DEFAULT 0,
            is_mod      INTEGER NOT NULL DEFAULT 0,
            is_janitor  INTEGER NOT NULL DEFAULT 0,
            joined_at   TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (room_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_room_members_user
            ON room_members(user_id);

        CREATE TABLE IF NOT EXISTS channel_categories (
            id          INTEGER PRIMARY KEY,
            room_id     INTEGER NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
            name        TEXT NOT NULL,
            position    INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(room_id, name)
        );

        CREATE TABLE IF NOT EXISTS channels (
            id          INTEGER PRIMARY KEY,
            room_id     INTEGER NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
            category_id INTEGER REFERENCES channel_categories(id) ON DELETE SET NULL,
            url_id      TEXT NOT NULL UNIQUE,
            name        TEXT NOT NULL,
            description TEXT,
            position    INTEGER NOT NULL DEFAULT 0,
            is_default  INTEGER NOT NULL DEFAULT 0,
            is_nsfw     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(room_id, name)
        );

        CREATE INDEX IF NOT EXISTS idx_channels_room
            ON channels(room_id, position);

        CREATE TABLE IF NOT EXISTS threads (
            id            INTEGER PRIMARY KEY,
            channel_id    INTEGER NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
            url_id        TEXT NOT NULL UNIQUE,
            subject       TEXT NOT NULL,
            author_id     INTEGER REFERENCES users(id) ON DELETE SET NULL,
            is_pinned     INTEGER NOT NULL DEFAULT 0,
            is_locked     INTEGER NOT NULL DEFAULT 0,
            is_anonymous  INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL DEFAULT (datetime('now')),
            last_activity TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_threads_channel
            ON threads(channel_id, last_activity);

        CREATE TABLE IF NOT EXISTS posts (
            id            INTEGER PRIMARY KEY,
            thread_id     INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
            author_id     INTEGER REFERENCES users(id) ON DELETE SET NULL,
            content       TEXT NOT NULL,
            country_code  TEXT,
            country_name  TEXT,
            created_at    TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_posts_thread
            ON posts(thread_id, created_at);

        CREATE TABLE IF NOT EXISTS file_attachments (
            id          INTEGER PRIMARY KEY,
            post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            file_name   TEXT NOT NULL,
            file_type   TEXT NOT NULL,
            file_size   INTEGER NOT NULL,
            file_url    TEXT NOT NULL,
            uploaded_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS friendships (
            id          INTEGER PRIMARY KEY,
            user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            friend_id   INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            status      TEXT NOT NULL CHECK (status IN ('pending', 'accepted', 'blocked')),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, friend_id)
        );

        CREATE TABLE IF NOT EXISTS friend_categories (
            id          INTEGER PRIMARY KEY,
            user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name        TEXT NOT NULL,
            position    INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, name)
        );

        CREATE TABLE IF NOT EXISTS friend_category_members (
            category_id INTEGER NOT NULL REFERENCES friend_categories(id) ON DELETE CASCADE,
            friend_id   INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            added_at    TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (category_id, friend_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
