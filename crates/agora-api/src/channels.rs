use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use agora_db::models::ChannelSummaryRow;
use agora_types::api::{
    CategoryChannelsView, ChannelSummaryView, ChannelsResponse, Claims, CreateChannelRequest,
    CreateChannelResponse, MessageBody, UpdateChannelRequest,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_db;

pub async fn create_channel(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("Channel name is required".into()));
    }

    let user_id = claims.sub;
    let (channel_id, url_id) = run_db(&state, move |db| {
        db.create_channel(
            room_id,
            user_id,
            req.name.trim(),
            req.description.as_deref(),
            req.is_nsfw,
            req.category_id,
        )
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateChannelResponse {
            message: "Channel created successfully".into(),
            channel_id,
            url_id,
        }),
    ))
}

/// GET /channels/{roomId} — channels grouped by category with thread
/// statistics, plus the caller's admin flag for the room.
pub async fn get_channels(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let (grouped, uncategorized, is_admin) =
        run_db(&state, move |db| db.list_channels(room_id, user_id)).await?;

    let categories = grouped
        .into_iter()
        .map(|(category, channels)| CategoryChannelsView {
            id: category.id,
            name: category.name,
            position: category.position,
            channels: channels.into_iter().map(summary_view).collect(),
        })
        .collect();

    Ok(Json(ChannelsResponse {
        categories,
        uncategorized_channels: uncategorized.into_iter().map(summary_view).collect(),
        is_admin,
    }))
}

pub async fn update_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateChannelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    run_db(&state, move |db| {
        db.update_channel(
            channel_id,
            user_id,
            req.name.as_deref(),
            req.description.as_deref(),
            req.is_nsfw,
            req.position,
        )
    })
    .await?;

    Ok(Json(MessageBody {
        message: "Channel updated successfully".into(),
    }))
}

pub async fn delete_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    run_db(&state, move |db| db.delete_channel(channel_id, user_id)).await?;

    Ok(Json(MessageBody {
        message: "Channel deleted successfully".into(),
    }))
}

fn summary_view(row: ChannelSummaryRow) -> ChannelSummaryView {
    ChannelSummaryView {
        id: row.id,
        url_id: row.url_id,
        name: row.name,
        description: row.description,
        position: row.position,
        is_default: row.is_default,
        is_nsfw: row.is_nsfw,
        thread_count: row.thread_count,
        latest_activity: row.latest_activity,
    }
}
