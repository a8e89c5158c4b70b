use thiserror::Error;

pub type DbResult<T> = std::result::Result<T, DbError>;

/// Closed error taxonomy for the persistence layer. Handlers map each
/// variant to an HTTP status, so new failure modes get a variant here
/// instead of a magic message string.
#[derive(Debug, Error)]
pub enum DbError {
    /// Bad or missing input (maps to 400).
    #[error("{0}")]
    Validation(String),

    /// Caller lacks the required membership or role (maps to 403).
    #[error("{0}")]
    Forbidden(String),

    /// Target row does not exist (maps to 404).
    #[error("{0}")]
    NotFound(String),

    /// State conflict: duplicates, locked threads, last-channel deletes
    /// (maps to 409).
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Internal(String),
}

impl DbError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for SQLite UNIQUE / CHECK constraint failures. Insert sites use
    /// this to turn duplicate names into a Conflict with a useful message.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// Maps a constraint violation on `result` to `Conflict(msg)`, leaving other
/// errors untouched.
pub(crate) fn constraint_to_conflict<T>(
    result: Result<T, rusqlite::Error>,
    msg: &str,
) -> DbResult<T> {
    result.map_err(|e| {
        let err = DbError::from(e);
        if err.is_constraint_violation() {
            DbError::conflict(msg)
        } else {
            err
        }
    })
}
