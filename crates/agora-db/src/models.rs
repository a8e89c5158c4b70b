//! Database row types, distinct from the agora-types API models so the
//! persistence layer stays independent of the wire shapes.

pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct RoomRow {
    pub id: i64,
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
    pub created_at: String,
}

pub struct MembershipRow {
    pub room_id: i64,
    pub user_id: i64,
    pub is_admin: bool,
    pub is_mod: bool,
    pub is_janitor: bool,
    pub joined_at: String,
}

/// A room joined with the caller's membership row.
pub struct UserRoomRow {
    pub room_id: i64,
    pub name: String,
    pub url_name: String,
    pub thumbnail_url: Option<String>,
    pub created_at: String,
    pub joined_at: String,
}

#[derive(Debug)]
pub struct CategoryRow {
    pub id: i64,
    pub room_id: i64,
    pub name: String,
    pub position: i64,
}

pub struct ChannelRow {
    pub id: i64,
    pub room_id: i64,
    pub category_id: Option<i64>,
    pub url_id: String,
    pub name: String,
    pub description: Option<String>,
    pub position: i64,
    pub is_default: bool,
    pub is_nsfw: bool,
}

/// Channel with aggregate thread statistics for the channel listing.
#[derive(Debug)]
pub struct ChannelSummaryRow {
    pub id: i64,
    pub category_id: Option<i64>,
    pub url_id: String,
    pub name: String,
    pub description: Option<String>,
    pub position: i64,
    pub is_default: bool,
    pub is_nsfw: bool,
    pub thread_count: i64,
    pub latest_activity: Option<String>,
}

pub struct ThreadSummaryRow {
    pub id: i64,
    pub url_id: String,
    pub subject: String,
    pub author_email: Option<String>,
    pub created_at: String,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub last_activity: String,
    pub post_count: i64,
    pub first_post: Option<String>,
}

pub struct PostRow {
    pub id: i64,
    pub content: String,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub author_email: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct FriendRow {
    pub id: i64,
    pub email: String,
    pub status: String,
    pub room_id: Option<i64>,
    pub room_url: Option<String>,
}

pub struct FriendRequestRow {
    pub id: i64,
    pub sender_id: i64,
    pub sender_email: String,
    pub created_at: String,
}

pub struct FriendCategoryRow {
    pub id: i64,
    pub name: String,
    pub position: i64,
}

pub struct FriendCategoryMemberRow {
    pub category_id: i64,
    pub friend_id: i64,
    pub email: String,
}
