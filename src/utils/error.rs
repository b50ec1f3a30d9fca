use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Competition with reference number {reference} not found on the portal")]
    NotFound { reference: String },

    #[error("Navigation timed out during step: {step}")]
    NavigationTimeout { step: &'static str },

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Scrape cancelled by caller")]
    Cancelled,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for failures that abort a live scrape as a whole.
    pub fn is_scrape_failure(&self) -> bool {
        matches!(
            self,
            AppError::NotFound { .. }
                | AppError::NavigationTimeout { .. }
                | AppError::Extraction(_)
                | AppError::Browser(_)
        )
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
