use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tokio::io::AsyncWriteExt;
use tracing::{error, warn};

use agora_db::rooms::NewRoom;
use agora_types::api::{Claims, CreateRoomResponse, MessageBody, RoomSummary, RoomsResponse};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_db;

/// 5 MB ceiling for room thumbnails.
const MAX_THUMBNAIL_SIZE: usize = 5 * 1024 * 1024;

/// POST /rooms — multipart form: room fields as text parts (booleans as
/// "true"/"false" strings, numeric limits parsed or nulled), plus an
/// optional `thumbnail` file part.
pub async fn create_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut name = None;
    let mut url_name = None;
    let mut description = None;
    let mut is_public = false;
    let mut is_hidden = false;
    let mut is_nsfw = false;
    let mut allow_anonymous = true;
    let mut allow_user_threads = true;
    let mut allow_accountless = false;
    let mut thread_limit = None;
    let mut posts_per_thread = None;
    let mut thumbnail: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::Validation("Malformed multipart payload".into()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();

        if field_name == "thumbnail" {
            let file_name = field.file_name().unwrap_or("thumbnail").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|_| ApiError::Validation("Malformed multipart payload".into()))?;
            if bytes.len() > MAX_THUMBNAIL_SIZE {
                return Err(ApiError::Validation("Thumbnail is too large".into()));
            }
            thumbnail = Some((file_name, bytes.to_vec()));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|_| ApiError::Validation("Malformed multipart payload".into()))?;

        match field_name.as_str() {
            "name" => name = Some(value),
            "url_name" => url_name = Some(value),
            "description" => description = Some(value),
            "is_public" => is_public = parse_bool(&value),
            "is_hidden" => is_hidden = parse_bool(&value),
            "is_nsfw" => is_nsfw = parse_bool(&value),
            "allow_anonymous" => allow_anonymous = parse_bool(&value),
            "allow_user_threads" => allow_user_threads = parse_bool(&value),
            "allow_accountless" => allow_accountless = parse_bool(&value),
            "thread_limit" => thread_limit = value.parse::<i64>().ok(),
            "posts_per_thread" => posts_per_thread = value.parse::<i64>().ok(),
            _ => {}
        }
    }

    let name = name.ok_or_else(|| ApiError::Validation("Room name is required".into()))?;
    let url_name =
        url_name.ok_or_else(|| ApiError::Validation("Room URL name is required".into()))?;
    if name.is_empty() || url_name.is_empty() {
        return Err(ApiError::Validation("Room name is required".into()));
    }

    let thumbnail_url = match thumbnail {
        Some((file_name, bytes)) => Some(save_upload(&state, &file_name, &bytes).await?),
        None => None,
    };

    let room = NewRoom {
        name,
        url_name,
        description,
        thumbnail_url,
        is_public,
        is_hidden,
        is_nsfw,
        allow_anonymous,
        allow_user_threads,
        allow_accountless,
        thread_limit,
        posts_per_thread,
    };

    let user_id = claims.sub;
    let room_id = run_db(&state, move |db| db.create_room(user_id, &room)).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateRoomResponse {
            message: "Room created successfully".into(),
            room_id,
        }),
    ))
}

pub async fn get_user_rooms(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let rows = run_db(&state, move |db| db.get_user_rooms(user_id)).await?;

    let rooms = rows
        .into_iter()
        .map(|row| RoomSummary {
            room_id: row.room_id,
            name: row.name,
            url_name: row.url_name,
            thumbnail_url: row.thumbnail_url,
            created_at: row.created_at,
            joined_at: row.joined_at,
        })
        .collect();

    Ok(Json(RoomsResponse { rooms }))
}

pub async fn join_room(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    run_db(&state, move |db| db.join_room(room_id, user_id)).await?;

    Ok(Json(MessageBody {
        message: "Successfully joined room".into(),
    }))
}

pub async fn leave_room(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let orphaned = run_db(&state, move |db| db.leave_room(room_id, user_id)).await?;

    if let Some(thumbnail_url) = orphaned {
        remove_thumbnail(&state, &thumbnail_url).await;
    }

    Ok(Json(MessageBody {
        message: "Successfully left room".into(),
    }))
}

pub async fn delete_room(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let orphaned = run_db(&state, move |db| db.delete_room(room_id, user_id)).await?;

    if let Some(thumbnail_url) = orphaned {
        remove_thumbnail(&state, &thumbnail_url).await;
    }

    Ok(Json(MessageBody {
        message: "Room successfully deleted".into(),
    }))
}

fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

/// Writes an uploaded file into the upload directory under a
/// timestamp-prefixed sanitized name and returns its public URL path.
pub(crate) async fn save_upload(
    state: &AppState,
    original_name: &str,
    bytes: &[u8],
) -> Result<String, ApiError> {
    let sanitized: String = original_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let file_name = format!("{}-{}", chrono::Utc::now().timestamp_millis(), sanitized);

    tokio::fs::create_dir_all(&state.upload_dir).await.map_err(|e| {
        error!("Failed to create upload directory: {}", e);
        ApiError::Internal
    })?;

    let path = state.upload_dir.join(&file_name);
    let mut file = tokio::fs::File::create(&path).await.map_err(|e| {
        error!("Failed to create file {}: {}", path.display(), e);
        ApiError::Internal
    })?;
    file.write_all(bytes).await.map_err(|e| {
        error!("Failed to write file {}: {}", path.display(), e);
        ApiError::Internal
    })?;

    Ok(format!("/uploads/{file_name}"))
}

/// Best-effort removal of a stored thumbnail after its room is destroyed.
/// The database change already committed, so failures are only logged.
async fn remove_thumbnail(state: &AppState, thumbnail_url: &str) {
    let Some(file_name) = thumbnail_url.strip_prefix("/uploads/") else {
        warn!("Unexpected thumbnail URL shape: {}", thumbnail_url);
        return;
    };
    let path = state.upload_dir.join(file_name);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!("Failed to delete thumbnail {}: {}", path.display(), e);
    }
}
