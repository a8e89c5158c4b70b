use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use agora_api::auth::{self, AppStateInner};
use agora_api::middleware::require_auth;
use agora_api::{categories, channels, friends, rooms, threads};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agora=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("AGORA_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("AGORA_DB_PATH").unwrap_or_else(|_| "agora.db".into());
    let host = std::env::var("AGORA_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("AGORA_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let upload_dir =
        PathBuf::from(std::env::var("AGORA_UPLOAD_DIR").unwrap_or_else(|_| "uploads".into()));

    // Init database
    let db = agora_db::Database::open(&PathBuf::from(&db_path))?;

    tokio::fs::create_dir_all(&upload_dir).await?;

    let state = Arc::new(AppStateInner { db, jwt_secret, upload_dir: upload_dir.clone() });

    // Routes
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/verify", get(auth::verify))
        // Rooms
        .route("/rooms", post(rooms::create_room).get(rooms::get_user_rooms))
        .route("/rooms/{roomId}/join", post(rooms::join_room))
        .route("/rooms/{roomId}/leave", post(rooms::leave_room))
        .route("/rooms/{roomId}", delete(rooms::delete_room))
        // Channel categories: POST/GET take a room id, PUT/DELETE a category id
        .route(
            "/categories/{id}",
            post(categories::create_category)
                .get(categories::get_categories)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        // Channels: POST/GET take a room id, PUT/DELETE a channel id
        .route(
            "/channels/{id}",
            post(channels::create_channel)
                .get(channels::get_channels)
                .put(channels::update_channel)
                .delete(channels::delete_channel),
        )
        // Threads: POST/GET take a channel id, DELETE a thread id
        .route(
            "/threads/{threadId}",
            post(threads::create_thread)
                .get(threads::get_threads)
                .delete(threads::delete_thread),
        )
        .route(
            "/threads/{threadId}/posts",
            post(threads::create_post).get(threads::get_posts),
        )
        // Friends
        .route("/friends", get(friends::get_friends))
        .route("/friends/request", post(friends::send_friend_request))
        .route("/friends/requests", get(friends::get_friend_requests))
        .route(
            "/friends/requests/{requestId}/{action}",
            post(friends::respond_to_friend_request),
        )
        .route("/friends/categories", post(friends::create_friend_category))
        .route("/friends/categories", get(friends::get_friend_categories))
        .route(
            "/friends/categories/{categoryId}",
            delete(friends::delete_friend_category),
        )
        .route(
            "/friends/categories/{categoryId}/members/{friendId}",
            put(friends::add_friend_to_category),
        )
        .layer(middleware::from_fn(require_auth));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Agora server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
