use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use agora_db::DbError;
use agora_types::api::{
    Claims, CreateFriendCategoryRequest, FriendCategoriesResponse, FriendCategoryView, FriendRef,
    FriendRequestView, FriendRequestsResponse, FriendView, FriendsResponse, MessageBody,
    RespondToFriendRequestResponse, SendFriendRequest,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_db;

pub async fn get_friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let rows = run_db(&state, move |db| db.list_friends(user_id)).await?;

    let friends = rows
        .into_iter()
        .map(|row| FriendView {
            id: row.id,
            email: row.email,
            status: row.status,
            room_id: row.room_id,
            room_url: row.room_url,
        })
        .collect();

    Ok(Json(FriendsResponse { friends }))
}

/// POST /friends/request — addressed by email, so senders never need to
/// know numeric user ids.
pub async fn send_friend_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendFriendRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    run_db(&state, move |db| {
        let receiver = db
            .get_user_by_email(&req.email)?
            .ok_or_else(|| DbError::not_found("User not found"))?;
        db.send_friend_request(user_id, receiver.id)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageBody {
            message: "Friend request sent".into(),
        }),
    ))
}

pub async fn get_friend_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let rows = run_db(&state, move |db| db.list_friend_requests(user_id)).await?;

    let requests = rows
        .into_iter()
        .map(|row| FriendRequestView {
            id: row.id,
            sender_id: row.sender_id,
            sender_email: row.sender_email,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(FriendRequestsResponse { requests }))
}

/// POST /friends/requests/{requestId}/{action} where action is `accept`
/// or `reject`. Accepting reports the DM room provisioned for the pair.
pub async fn respond_to_friend_request(
    State(state): State<AppState>,
    Path((request_id, action)): Path<(i64, String)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let accept = match action.as_str() {
        "accept" => true,
        "reject" => false,
        _ => {
            return Err(ApiError::Validation(
                "Action must be 'accept' or 'reject'".into(),
            ));
        }
    };

    let user_id = claims.sub;
    let room_id = run_db(&state, move |db| {
        db.respond_to_friend_request(request_id, user_id, accept)
    })
    .await?;

    let message = if accept {
        "Friend request accepted"
    } else {
        "Friend request rejected"
    };
    Ok(Json(RespondToFriendRequestResponse {
        message: message.into(),
        room_id,
    }))
}

// -- Friend categories --

pub async fn create_friend_category(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateFriendCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("Category name is required".into()));
    }

    let user_id = claims.sub;
    let category_id = run_db(&state, move |db| {
        db.create_friend_category(user_id, req.name.trim(), req.position)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Friend category created successfully",
            "categoryId": category_id,
        })),
    ))
}

pub async fn get_friend_categories(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let grouped = run_db(&state, move |db| db.list_friend_categories(user_id)).await?;

    let categories = grouped
        .into_iter()
        .map(|(category, members)| FriendCategoryView {
            id: category.id,
            name: category.name,
            position: category.position,
            members: members
                .into_iter()
                .map(|m| FriendRef {
                    id: m.friend_id,
                    email: m.email,
                })
                .collect(),
        })
        .collect();

    Ok(Json(FriendCategoriesResponse { categories }))
}

pub async fn delete_friend_category(
    State(state): State<AppState>,
    Path(category_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    run_db(&state, move |db| {
        db.delete_friend_category(category_id, user_id)
    })
    .await?;

    Ok(Json(MessageBody {
        message: "Friend category deleted successfully".into(),
    }))
}

pub async fn add_friend_to_category(
    State(state): State<AppState>,
    Path((category_id, friend_id)): Path<(i64, i64)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    run_db(&state, move |db| {
        db.add_friend_to_category(category_id, friend_id, user_id)
    })
    .await?;

    Ok(Json(MessageBody {
        message: "Friend added to category".into(),
    }))
}
