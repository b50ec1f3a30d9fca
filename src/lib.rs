pub mod browser;
pub mod config;
pub mod models;
pub mod portal;
pub mod resolver;
pub mod scrape;
pub mod store;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use models::{CompetitionRecord, RecordSource, SearchQuery};
pub use resolver::CompetitionResolver;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
