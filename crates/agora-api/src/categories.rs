use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use agora_types::api::{
    CategoriesResponse, CategoryView, ChannelView, Claims, CreateCategoryRequest,
    CreateCategoryResponse, MessageBody, UpdateCategoryRequest,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_db;

pub async fn create_category(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("Category name is required".into()));
    }

    let user_id = claims.sub;
    let category_id = run_db(&state, move |db| {
        db.create_category(room_id, user_id, req.name.trim(), req.position)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateCategoryResponse {
            message: "Category created successfully".into(),
            category_id,
        }),
    ))
}

pub async fn get_categories(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let (grouped, uncategorized) = run_db(&state, move |db| db.list_categories(room_id)).await?;

    let categories = grouped
        .into_iter()
        .map(|(category, channels)| CategoryView {
            id: category.id,
            name: category.name,
            position: category.position,
            channels: channels.into_iter().map(channel_view).collect(),
        })
        .collect();

    Ok(Json(CategoriesResponse {
        categories,
        uncategorized_channels: uncategorized.into_iter().map(channel_view).collect(),
    }))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(category_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.is_none() && req.position.is_none() {
        return Err(ApiError::Validation("Nothing to update".into()));
    }

    let user_id = claims.sub;
    run_db(&state, move |db| {
        db.update_category(category_id, user_id, req.name.as_deref(), req.position)
    })
    .await?;

    Ok(Json(MessageBody {
        message: "Category updated successfully".into(),
    }))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(category_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    run_db(&state, move |db| db.delete_category(category_id, user_id)).await?;

    Ok(Json(MessageBody {
        message: "Category deleted successfully".into(),
    }))
}

fn channel_view(row: agora_db::models::ChannelRow) -> ChannelView {
    ChannelView {
        id: row.id,
        url_id: row.url_id,
        name: row.name,
        description: row.description,
        position: row.position,
        is_default: row.is_default,
        is_nsfw: row.is_nsfw,
    }
}
