#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid employer ID: {0}")]
    InvalidArgument(String),

    #[error("Employer ID does not exist: {0}")]
    NotFound(i64),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
