/// Errors that can occur in the data layer.
#[derive(Debug)]
pub enum DataError {
    NotFound(String),
    Database(Box<dyn std::error::Error + Send + Sync>),
    /// No pool is registered for a `dbConnection` name. Retryable at the
    /// facade — the event logger treats this the same way.
    Unavailable(String),
    Other(String),
}

impl DataError {
    /// Construct a `Database` variant from any error type.
    ///
    /// Used by backend crates (e.g. `conduit-data-sqlx`, `conduit-data-diesel`)
    /// to wrap driver-specific errors.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Database(Box::new(err))
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::NotFound(msg) => write!(f, "Not found: {msg}"),
            DataError::Database(err) => write!(f, "Database error: {err}"),
            DataError::Unavailable(msg) => write!(f, "Connection unavailable: {msg}"),
            DataError::Other(msg) => write!(f, "Data error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Database(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<DataError> for conduit_core::AppError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::NotFound(msg) => conduit_core::AppError::NotFound(msg),
            DataError::Database(e) => conduit_core::AppError::Db {
                message: e.to_string(),
                transient: false,
            },
            DataError::Unavailable(msg) => conduit_core::AppError::Db {
                message: msg,
                transient: true,
            },
            DataError::Other(msg) => conduit_core::AppError::Internal(msg),
        }
    }
}
