use std::collections::HashSet;

use async_trait::async_trait;

use crate::listing::CarListing;

/// Persistent destination for validated listings.
///
/// Inserts are idempotent per URL: re-inserting a stored URL is a no-op,
/// not an error.
#[async_trait]
pub trait ListingSink: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Inserts `listings`, ignoring URLs that are already stored.
    /// Returns the number of rows actually written.
    async fn insert_batch(&self, listings: &[CarListing]) -> Result<u64, Self::Error>;

    /// Returns the subset of `urls` that is already stored.
    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>, Self::Error>;
}
