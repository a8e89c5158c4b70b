use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use agora_db::threads::NewAttachment;
use agora_types::api::{
    Claims, CreatePostRequest, CreateThreadResponse, MessageBody, PageQuery, PostView,
    PostsResponse, ThreadView, ThreadsResponse,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::rooms::save_upload;
use crate::run_db;

const DEFAULT_THREAD_PAGE: i64 = 20;
const DEFAULT_POST_PAGE: i64 = 50;

/// 10 MB ceiling for thread attachments.
const MAX_ATTACHMENT_SIZE: usize = 10 * 1024 * 1024;

/// POST /threads/{channelId} — multipart form with `subject`,
/// `content` and `is_anonymous` text parts plus an optional `attachment`
/// file part stored next to the opening post.
pub async fn create_thread(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut subject = None;
    let mut content = None;
    let mut is_anonymous = false;
    let mut upload: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::Validation("Malformed multipart payload".into()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();

        if field_name == "attachment" {
            let file_name = field.file_name().unwrap_or("attachment").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|_| ApiError::Validation("Malformed multipart payload".into()))?;
            if bytes.len() > MAX_ATTACHMENT_SIZE {
                return Err(ApiError::Validation("Attachment is too large".into()));
            }
            upload = Some((file_name, content_type, bytes.to_vec()));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|_| ApiError::Validation("Malformed multipart payload".into()))?;

        match field_name.as_str() {
            "subject" => subject = Some(value),
            "content" => content = Some(value),
            "is_anonymous" => is_anonymous = value.eq_ignore_ascii_case("true"),
            _ => {}
        }
    }

    let subject = subject
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Subject is required".into()))?;
    let content = content
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Content is required".into()))?;

    let attachment = match upload {
        Some((file_name, content_type, bytes)) => {
            let file_url = save_upload(&state, &file_name, &bytes).await?;
            Some(NewAttachment {
                file_name,
                file_type: content_type,
                file_size: bytes.len() as i64,
                file_url,
            })
        }
        None => None,
    };

    let user_id = claims.sub;
    let (thread_id, url_id) = run_db(&state, move |db| {
        db.create_thread(
            channel_id,
            user_id,
            &subject,
            &content,
            is_anonymous,
            attachment.as_ref(),
        )
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateThreadResponse {
            message: "Thread created successfully".into(),
            thread_id,
            url_id,
        }),
    ))
}

pub async fn get_threads(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = page.limit.unwrap_or(DEFAULT_THREAD_PAGE).clamp(1, 100);
    let offset = (page.page.max(1) - 1) * limit;
    let rows = run_db(&state, move |db| db.list_threads(channel_id, limit, offset)).await?;

    let threads = rows
        .into_iter()
        .map(|row| ThreadView {
            id: row.id,
            url_id: row.url_id,
            subject: row.subject,
            author_email: row.author_email,
            created_at: row.created_at,
            is_pinned: row.is_pinned,
            is_locked: row.is_locked,
            last_activity: row.last_activity,
            post_count: row.post_count,
            first_post: row.first_post,
        })
        .collect();

    Ok(Json(ThreadsResponse { threads }))
}

pub async fn delete_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    run_db(&state, move |db| db.delete_thread(thread_id, user_id)).await?;

    Ok(Json(MessageBody {
        message: "Thread deleted successfully".into(),
    }))
}

pub async fn create_post(
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("Content is required".into()));
    }

    let user_id = claims.sub;
    let post_id = run_db(&state, move |db| {
        let country = match (req.country_code.as_deref(), req.country_name.as_deref()) {
            (Some(code), Some(name)) => Some((code, name)),
            _ => None,
        };
        db.create_post(thread_id, user_id, &req.content, country)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Post created successfully",
            "postId": post_id,
        })),
    ))
}

pub async fn get_posts(
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = page.limit.unwrap_or(DEFAULT_POST_PAGE).clamp(1, 200);
    let offset = (page.page.max(1) - 1) * limit;
    let rows = run_db(&state, move |db| db.list_posts(thread_id, limit, offset)).await?;

    let posts = rows
        .into_iter()
        .map(|row| PostView {
            id: row.id,
            content: row.content,
            country_code: row.country_code,
            country_name: row.country_name,
            author_email: row.author_email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .collect();

    Ok(Json(PostsResponse { posts }))
}
