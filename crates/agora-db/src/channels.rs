//! Categories and channels, including the dense-ordering and
//! default-channel invariants.

use rusqlite::{Connection, OptionalExtension};

use crate::error::constraint_to_conflict;
use crate::ids::generate_url_id;
use crate::models::{CategoryRow, ChannelRow, ChannelSummaryRow};
use crate::positions::{self, Scope};
use crate::rooms::{require_admin, require_member};
use crate::{Database, DbError, DbResult};

impl Database {
    pub fn create_category(
        &self,
        room_id: i64,
        user_id: i64,
        name: &str,
        position: Option<i64>,
    ) -> DbResult<i64> {
        self.with_tx(|tx| {
            require_admin(tx, room_id, user_id, "Only room admins can create categories")?;

            constraint_to_conflict(
                tx.execute(
                    "INSERT INTO channel_categories (room_id, name, position) VALUES (?1, ?2, ?3)",
                    (room_id, name, i64::MAX),
                ),
                "A category with this name already exists in this room",
            )?;
            let category_id = tx.last_insert_rowid();

            positions::place(tx, &Scope::Categories { room_id }, category_id, position)?;
            Ok(category_id)
        })
    }

    pub fn update_category(
        &self,
        category_id: i64,
        user_id: i64,
        name: Option<&str>,
        position: Option<i64>,
    ) -> DbResult<()> {
        self.with_tx(|tx| {
            let room_id = category_room(tx, category_id)?;
            require_admin(tx, room_id, user_id, "Only room admins can update categories")?;

            if name.is_some() {
                constraint_to_conflict(
                    tx.execute(
                        "UPDATE channel_categories
                         SET name = COALESCE(?1, name), updated_at = datetime('now')
                         WHERE id = ?2",
                        (name, category_id),
                    ),
                    "A category with this name already exists in this room",
                )?;
            }

            if position.is_some() {
                positions::place(tx, &Scope::Categories { room_id }, category_id, position)?;
            }
            Ok(())
        })
    }

    /// Deleting a category keeps its channels: they are detached into the
    /// uncategorized scope before the row goes away.
    pub fn delete_category(&self, category_id: i64, user_id: i64) -> DbResult<()> {
        self.with_tx(|tx| {
            let room_id = category_room(tx, category_id)?;
            require_admin(tx, room_id, user_id, "Only room admins can delete categories")?;

            tx.execute(
                "UPDATE channels SET category_id = NULL, updated_at = datetime('now')
                 WHERE category_id = ?1",
                [category_id],
            )?;
            positions::compact(tx, &Scope::Channels { room_id, category_id: None })?;

            tx.execute(
                "DELETE FROM channel_categories WHERE id = ?1",
                [category_id],
            )?;
            positions::compact(tx, &Scope::Categories { room_id })?;
            Ok(())
        })
    }

    /// Categories with their channels in position order, plus channels that
    /// belong to no category.
    #[allow(clippy::type_complexity)]
    pub fn list_categories(
        &self,
        room_id: i64,
    ) -> DbResult<(Vec<(CategoryRow, Vec<ChannelRow>)>, Vec<ChannelRow>)> {
        self.with_conn(|conn| {
            let categories = load_categories(conn, room_id)?;
            let channels = load_channels(conn, room_id)?;

            let mut grouped: Vec<(CategoryRow, Vec<ChannelRow>)> = categories
                .into_iter()
                .map(|category| (category, Vec::new()))
                .collect();
            let mut uncategorized = Vec::new();

            for channel in channels {
                match channel.category_id {
                    Some(cid) => {
                        if let Some((_, bucket)) =
                            grouped.iter_mut().find(|(category, _)| category.id == cid)
                        {
                            bucket.push(channel);
                        }
                    }
                    None => uncategorized.push(channel),
                }
            }

            Ok((grouped, uncategorized))
        })
    }

    pub fn create_channel(
        &self,
        room_id: i64,
        user_id: i64,
        name: &str,
        description: Option<&str>,
        is_nsfw: bool,
        category_id: i64,
    ) -> DbResult<(i64, String)> {
        self.with_tx(|tx| {
            require_admin(tx, room_id, user_id, "Only room admins can create channels")?;

            let valid_category: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM channel_categories WHERE id = ?1 AND room_id = ?2)",
                (category_id, room_id),
                |row| row.get(0),
            )?;
            if !valid_category {
                return Err(DbError::validation("Invalid category"));
            }

            insert_channel(tx, room_id, Some(category_id), name, description, is_nsfw, None)
        })
    }

    /// Channels grouped by category with thread statistics, plus the
    /// caller's admin flag. Members only.
    #[allow(clippy::type_complexity)]
    pub fn list_channels(
        &self,
        room_id: i64,
        user_id: i64,
    ) -> DbResult<(
        Vec<(CategoryRow, Vec<ChannelSummaryRow>)>,
        Vec<ChannelSummaryRow>,
        bool,
    )> {
        self.with_conn(|conn| {
            let is_admin = require_member(conn, room_id, user_id)?;

            let categories = load_categories(conn, room_id)?;

            let mut stmt = conn.prepare(
                "SELECT c.id, c.category_id, c.url_id, c.name, c.description, c.position,
                        c.is_default, c.is_nsfw,
                        COUNT(t.id), MAX(t.last_activity)
                 FROM channels c
                 LEFT JOIN threads t ON c.id = t.channel_id
                 WHERE c.room_id = ?1
                 GROUP BY c.id
                 ORDER BY c.position, c.id",
            )?;
            let channels = stmt
                .query_map([room_id], |row| {
                    Ok(ChannelSummaryRow {
                        id: row.get(0)?,
                        category_id: row.get(1)?,
                        url_id: row.get(2)?,
                        name: row.get(3)?,
                        description: row.get(4)?,
                        position: row.get(5)?,
                        is_default: row.get(6)?,
                        is_nsfw: row.get(7)?,
                        thread_count: row.get(8)?,
                        latest_activity: row.get(9)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut grouped: Vec<(CategoryRow, Vec<ChannelSummaryRow>)> = categories
                .into_iter()
                .map(|category| (category, Vec::new()))
                .collect();
            let mut uncategorized = Vec::new();

            for channel in channels {
                match channel.category_id {
                    Some(cid) => {
                        if let Some((_, bucket)) =
                            grouped.iter_mut().find(|(category, _)| category.id == cid)
                        {
                            bucket.push(channel);
                        }
                    }
                    None => uncategorized.push(channel),
                }
            }

            Ok((grouped, uncategorized, is_admin))
        })
    }

    pub fn update_channel(
        &self,
        channel_id: i64,
        user_id: i64,
        name: Option<&str>,
        description: Option<&str>,
        is_nsfw: Option<bool>,
        position: Option<i64>,
    ) -> DbResult<()> {
        self.with_tx(|tx| {
            let (room_id, category_id) = channel_scope(tx, channel_id)?;
            require_admin(tx, room_id, user_id, "Only room admins can update channels")?;

            constraint_to_conflict(
                tx.execute(
                    "UPDATE channels
                     SET name = COALESCE(?1, name),
                         description = COALESCE(?2, description),
                         is_nsfw = COALESCE(?3, is_nsfw),
                         updated_at = datetime('now')
                     WHERE id = ?4",
                    (name, description, is_nsfw, channel_id),
                ),
                "A channel with this name already exists in this room",
            )?;

            if position.is_some() {
                positions::place(
                    tx,
                    &Scope::Channels { room_id, category_id },
                    channel_id,
                    position,
                )?;
            }
            Ok(())
        })
    }

    pub fn delete_channel(&self, channel_id: i64, user_id: i64) -> DbResult<()> {
        self.with_tx(|tx| {
            let (room_id, category_id) = channel_scope(tx, channel_id)?;
            require_admin(tx, room_id, user_id, "Only room admins can delete channels")?;

            let total: i64 = tx.query_row(
                "SELECT COUNT(*) FROM channels WHERE room_id = ?1",
                [room_id],
                |row| row.get(0),
            )?;
            if total <= 1 {
                return Err(DbError::conflict("Cannot delete the last channel in a room"));
            }

            tx.execute("DELETE FROM channels WHERE id = ?1", [channel_id])?;
            positions::compact(tx, &Scope::Channels { room_id, category_id })?;

            ensure_default_channel(tx, room_id)?;
            Ok(())
        })
    }
}

/// Shared insert path for create_channel and DM room provisioning. Draws a
/// url_id, forces the first channel of a room to be the default, and places
/// the new row in its ordering scope.
pub(crate) fn insert_channel(
    conn: &Connection,
    room_id: i64,
    category_id: Option<i64>,
    name: &str,
    description: Option<&str>,
    is_nsfw: bool,
    position: Option<i64>,
) -> DbResult<(i64, String)> {
    let url_id = generate_url_id(conn, "channels", "url_id")?;

    let has_default: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM channels WHERE room_id = ?1 AND is_default = 1)",
        [room_id],
        |row| row.get(0),
    )?;

    constraint_to_conflict(
        conn.execute(
            "INSERT INTO channels (room_id, category_id, url_id, name, description,
                                   position, is_default, is_nsfw)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            (
                room_id,
                category_id,
                &url_id,
                name,
                description,
                i64::MAX,
                !has_default,
                is_nsfw,
            ),
        ),
        "A channel with this name already exists in this room",
    )?;
    let channel_id = conn.last_insert_rowid();

    positions::place(conn, &Scope::Channels { room_id, category_id }, channel_id, position)?;
    Ok((channel_id, url_id))
}

/// Re-establishes the >=1 default channel invariant after a delete by
/// promoting the lowest-positioned survivor.
fn ensure_default_channel(conn: &Connection, room_id: i64) -> DbResult<()> {
    let has_default: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM channels WHERE room_id = ?1 AND is_default = 1)",
        [room_id],
        |row| row.get(0),
    )?;
    if !has_default {
        conn.execute(
            "UPDATE channels SET is_default = 1, updated_at = datetime('now')
             WHERE id = (SELECT id FROM channels WHERE room_id = ?1 ORDER BY position, id LIMIT 1)",
            [room_id],
        )?;
    }
    Ok(())
}

fn category_room(conn: &Connection, category_id: i64) -> DbResult<i64> {
    conn.query_row(
        "SELECT room_id FROM channel_categories WHERE id = ?1",
        [category_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| DbError::not_found("Category not found"))
}

fn channel_scope(conn: &Connection, channel_id: i64) -> DbResult<(i64, Option<i64>)> {
    conn.query_row(
        "SELECT room_id, category_id FROM channels WHERE id = ?1",
        [channel_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?
    .ok_or_else(|| DbError::not_found("Channel not found"))
}

fn load_categories(conn: &Connection, room_id: i64) -> DbResult<Vec<CategoryRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, room_id, name, position FROM channel_categories
         WHERE room_id = ?1 ORDER BY position, id",
    )?;
    let rows = stmt
        .query_map([room_id], |row| {
            Ok(CategoryRow {
                id: row.get(0)?,
                room_id: row.get(1)?,
                name: row.get(2)?,
                position: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn load_channels(conn: &Connection, room_id: i64) -> DbResult<Vec<ChannelRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, room_id, category_id, url_id, name, description, position,
                is_default, is_nsfw
         FROM channels WHERE room_id = ?1 ORDER BY position, id",
    )?;
    let rows = stmt
        .query_map([room_id], |row| {
            Ok(ChannelRow {
                id: row.get(0)?,
                room_id: row.get(1)?,
                category_id: row.get(2)?,
                url_id: row.get(3)?,
                name: row.get(4)?,
                description: row.get(5)?,
                position: row.get(6)?,
                is_default: row.get(7)?,
                is_nsfw: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
