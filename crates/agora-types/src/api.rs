use serde::{Deserialize, Serialize};

// -- JWT Claims --

/// JWT claims shared between agora-api's REST middleware and the auth
/// handlers. `sub` is the numeric user id, matching the database primary key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned by both register and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub email: String,
}

/// Generic `{message}` body used for mutation acknowledgements and errors.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

// -- Rooms --

#[derive(Debug, Serialize)]
pub struct CreateRoomResponse {
    pub message: String,
    #[serde(rename = "roomId")]
    pub room_id: i64,
}

#[derive(Debug, Serialize)]
pub struct RoomSummary {
    #[serde(rename = "roomId")]
    pub room_id: i64,
    pub name: String,
    pub url_name: String,
    pub thumbnail_url: Option<String>,
    pub created_at: String,
    pub joined_at: String,
}

#[derive(Debug, Serialize)]
pub struct RoomsResponse {
    pub rooms: Vec<RoomSummary>,
}

// -- Categories & channels --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub position: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub position: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CreateCategoryResponse {
    pub message: String,
    #[serde(rename = "categoryId")]
    pub category_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ChannelView {
    pub id: i64,
    pub url_id: String,
    pub name: String,
    pub description: Option<String>,
    pub position: i64,
    pub is_default: bool,
    pub is_nsfw: bool,
}

#[derive(Debug, Serialize)]
pub struct CategoryView {
    pub id: i64,
    pub name: String,
    pub position: i64,
    pub channels: Vec<ChannelView>,
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<CategoryView>,
    #[serde(rename = "uncategorizedChannels")]
    pub uncategorized_channels: Vec<ChannelView>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChannelRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "isNsfw", default)]
    pub is_nsfw: bool,
    #[serde(rename = "categoryId")]
    pub category_id: i64,
}

#[derive(Debug, Serialize)]
pub struct CreateChannelResponse {
    pub message: String,
    #[serde(rename = "channelId")]
    pub channel_id: i64,
    #[serde(rename = "urlId")]
    pub url_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateChannelRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "isNsfw")]
    pub is_nsfw: Option<bool>,
    pub position: Option<i64>,
}

/// Channel with thread statistics, as returned by the channel listing.
#[derive(Debug, Serialize)]
pub struct ChannelSummaryView {
    pub id: i64,
    pub url_id: String,
    pub name: String,
    pub description: Option<String>,
    pub position: i64,
    pub is_default: bool,
    pub is_nsfw: bool,
    pub thread_count: i64,
    pub latest_activity: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CategoryChannelsView {
    pub id: i64,
    pub name: String,
    pub position: i64,
    pub channels: Vec<ChannelSummaryView>,
}

#[derive(Debug, Serialize)]
pub struct ChannelsResponse {
    pub categories: Vec<CategoryChannelsView>,
    #[serde(rename = "uncategorizedChannels")]
    pub uncategorized_channels: Vec<ChannelSummaryView>,
    pub is_admin: bool,
}

// -- Threads & posts --

#[derive(Debug, Serialize)]
pub struct CreateThreadResponse {
    pub message: String,
    #[serde(rename = "threadId")]
    pub thread_id: i64,
    #[serde(rename = "urlId")]
    pub url_id: String,
}

#[derive(Debug, Serialize)]
pub struct ThreadView {
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

#[derive(Debug, Serialize)]
pub struct ThreadsResponse {
    pub threads: Vec<ThreadView>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub content: String,
    #[serde(rename = "countryCode")]
    pub country_code: Option<String>,
    #[serde(rename = "countryName")]
    pub country_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: i64,
    pub content: String,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub author_email: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct PostsResponse {
    pub posts: Vec<PostView>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    pub limit: Option<i64>,
}

fn default_page() -> i64 {
    1
}

// -- Friends --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendFriendRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct FriendView {
    pub id: i64,
    pub email: String,
    pub status: String,
    #[serde(rename = "roomId")]
    pub room_id: Option<i64>,
    #[serde(rename = "roomUrl")]
    pub room_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FriendsResponse {
    pub friends: Vec<FriendView>,
}

#[derive(Debug, Serialize)]
pub struct FriendRequestView {
    pub id: i64,
    #[serde(rename = "senderId")]
    pub sender_id: i64,
    #[serde(rename = "senderEmail")]
    pub sender_email: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct FriendRequestsResponse {
    pub requests: Vec<FriendRequestView>,
}

#[derive(Debug, Serialize)]
pub struct RespondToFriendRequestResponse {
    pub message: String,
    #[serde(rename = "roomId")]
    pub room_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateFriendCategoryRequest {
    pub name: String,
    pub position: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct FriendRef {
    pub id: i64,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct FriendCategoryView {
    pub id: i64,
    pub name: String,
    pub position: i64,
    pub members: Vec<FriendRef>,
}

#[derive(Debug, Serialize)]
pub struct FriendCategoriesResponse {
    pub categories: Vec<FriendCategoryView>,
}
