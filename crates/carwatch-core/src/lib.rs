pub mod app_config;
pub mod config;
pub mod listing;
pub mod schedule;
pub mod sink;

use thiserror::Error;

pub use app_config::{AppConfig, ScraperSettings};
pub use config::{load_app_config, load_app_config_from_env};
pub use listing::{
    validate_listing, CarListing, FieldMap, FieldValue, MissingField, MissingReport,
    ValidationError, OPTIONAL_FIELDS,
};
pub use schedule::{ClockTime, ScheduleConfig};
pub use sink::ListingSink;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
