pub mod auth;
pub mod categories;
pub mod channels;
pub mod error;
pub mod friends;
pub mod middleware;
pub mod rooms;
pub mod threads;

use tracing::error;

use crate::auth::AppState;
use crate::error::ApiError;

/// Runs a blocking database closure off the async runtime, mapping join
/// failures and DbError variants into API errors. Every handler goes
/// through here rather than touching the Database on the async thread.
pub(crate) async fn run_db<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&agora_db::Database) -> agora_db::DbResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}
