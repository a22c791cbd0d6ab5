//! Search-result pagination and listing URL discovery.
//!
//! Page 1 is the configured start URL as-is; later pages rewrite only the
//! `page` query parameter. Discovery stops at the page limit, at the first
//! page without listing links, or at the first page (after the first) whose
//! links were all seen earlier in the run.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;

use crate::error::ScraperError;
use crate::fetch::PageFetch;

/// Origin used when the start URL is relative, and the default origin for
/// listing links.
pub const DEFAULT_ORIGIN: &str = "https://auto.ria.com";

const PAGE_PARAM: &str = "page";

static LISTING_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:https?://auto\.ria\.com)?(/uk/auto_[^"'#?\s<>]+?\.html)"#)
        .expect("valid regex")
});

// Joining onto the default origin leaves absolute URLs untouched and
// anchors relative ones.
fn parse_base(base_url: &str) -> Result<Url, ScraperError> {
    Url::parse(DEFAULT_ORIGIN)
        .and_then(|origin| origin.join(base_url))
        .map_err(|e| ScraperError::InvalidUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })
}

/// Returns the URL of search-result page `page`.
///
/// Page 1 (and 0) is `base_url` verbatim. For later pages every existing
/// query parameter is kept in order, the first `page` parameter is set to
/// `page` (duplicates are dropped, a missing one is appended), and a
/// relative base is anchored at [`DEFAULT_ORIGIN`].
///
/// # Errors
///
/// Returns [`ScraperError::InvalidUrl`] if `base_url` cannot be parsed.
pub fn build_page_url(base_url: &str, page: usize) -> Result<String, ScraperError> {
    if page <= 1 {
        return Ok(base_url.to_owned());
    }

    let mut url = parse_base(base_url)?;
    let page_value = page.to_string();
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut replaced = false;
    for (key, value) in url.query_pairs() {
        if key == PAGE_PARAM {
            if !replaced {
                pairs.push((key.into_owned(), page_value.clone()));
                replaced = true;
            }
        } else {
            pairs.push((key.into_owned(), value.into_owned()));
        }
    }
    if !replaced {
        pairs.push((PAGE_PARAM.to_owned(), page_value));
    }

    url.query_pairs_mut().clear().extend_pairs(pairs);
    Ok(url.to_string())
}

/// Extracts listing URLs from a search page, absolute or relative, in
/// first-seen order without duplicates. Every URL is anchored at `origin`.
#[must_use]
pub fn extract_listing_urls(html: &str, origin: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    LISTING_URL_RE
        .captures_iter(html)
        .filter_map(|cap| cap.get(1))
        .map(|path| format!("{origin}{}", path.as_str()))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Lazy, finite sequence of listing URL batches, one per search page.
///
/// Not restartable: once it reports exhaustion it keeps returning `None`.
pub struct Frontier<'a, F: PageFetch + ?Sized> {
    fetcher: &'a F,
    base_url: String,
    origin: String,
    max_pages: usize,
    next_page: usize,
    seen: HashSet<String>,
    exhausted: bool,
}

impl<'a, F: PageFetch + ?Sized> Frontier<'a, F> {
    /// Listing links are anchored at `origin`, whatever host serves the
    /// search pages. `max_pages == 0` means no page limit.
    pub fn new(fetcher: &'a F, base_url: &str, origin: &str, max_pages: usize) -> Self {
        Self {
            fetcher,
            base_url: base_url.to_owned(),
            origin: origin.trim_end_matches('/').to_owned(),
            max_pages,
            next_page: 1,
            seen: HashSet::new(),
            exhausted: false,
        }
    }

    /// Number of search pages requested so far.
    #[must_use]
    pub fn pages_visited(&self) -> usize {
        self.next_page - 1
    }

    /// Distinct listing URLs discovered so far.
    #[must_use]
    pub fn discovered(&self) -> usize {
        self.seen.len()
    }

    /// Fetches the next search page and returns its listing URLs that are
    /// new to this run, or `None` once discovery is over.
    pub async fn next_batch(&mut self) -> Option<Vec<String>> {
        if self.exhausted {
            return None;
        }
        let page = self.next_page;
        if self.max_pages > 0 && page > self.max_pages {
            tracing::info!(max_pages = self.max_pages, "frontier: page limit reached");
            return self.finish();
        }

        let page_url = match build_page_url(&self.base_url, page) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(page, error = %e, "frontier: cannot build page URL");
                return self.finish();
            }
        };
        self.next_page += 1;

        let html = self.fetcher.get(&page_url).await;
        let page_urls = extract_listing_urls(&html, &self.origin);
        if page_urls.is_empty() {
            tracing::info!(page, url = %page_url, "frontier: page has no listings; stopping");
            return self.finish();
        }

        let fresh: Vec<String> = page_urls
            .into_iter()
            .filter(|url| self.seen.insert(url.clone()))
            .collect();
        if page > 1 && fresh.is_empty() {
            tracing::info!(page, "frontier: page repeats earlier listings; stopping");
            return self.finish();
        }

        tracing::info!(page, found = fresh.len(), "frontier: page scanned");
        Some(fresh)
    }

    fn finish(&mut self) -> Option<Vec<String>> {
        self.exhausted = true;
        None
    }
}

#[cfg(test)]
#[path = "frontier_test.rs"]
mod tests;
