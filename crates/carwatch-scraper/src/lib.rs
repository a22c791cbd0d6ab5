//! Listing crawler for auto.ria.com used-car search results.
//!
//! [`Frontier`] walks paginated search results, [`extract_listing`] resolves
//! listing fields from a page, and [`Pipeline`] runs both through a worker
//! pool into a [`carwatch_core::ListingSink`].

pub mod error;
pub mod extract;
pub mod fetch;
pub mod frontier;
pub mod phone;
pub mod pipeline;

pub use error::ScraperError;
pub use extract::{extract_listing, Extraction, LookupMeta};
pub use fetch::{FetchPolicy, HttpFetcher, Method, PageFetch};
pub use frontier::{build_page_url, extract_listing_urls, Frontier};
pub use phone::{build_phone_payload, lookup_phone, normalize_phone_digits};
pub use pipeline::{Pipeline, PipelineConfig, RunSummary};
