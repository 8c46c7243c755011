pub type Result<T> = std::result::Result<T, Error>;

pub const INVALID_CREDENTIALS: &str = "invalid credentials";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller-supplied data is missing, malformed or breaks a business rule.
    #[error("{0}")]
    Validation(String),

    /// Credentials did not match. Carries the same message for every cause.
    #[error("{0}")]
    Authentication(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn invalid_credentials() -> Self {
        Error::Authentication(INVALID_CREDENTIALS.to_string())
    }

    /// Internal faults the caller should log and hide behind a generic message.
    pub fn is_storage_fault(&self) -> bool {
        matches!(
            self,
            Error::Storage(_) | Error::Database(_) | Error::Io(_) | Error::Config(_)
        )
    }
}
