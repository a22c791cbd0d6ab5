use carwatch_core::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("empty response for {url}")]
    EmptyResponse { url: String },

    #[error("validation failed for {url}: {source}")]
    Validation {
        url: String,
        #[source]
        source: ValidationError,
    },

    #[error("sink error: {source}")]
    Sink {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
