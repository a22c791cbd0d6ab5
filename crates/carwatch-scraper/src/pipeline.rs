//! Producer/worker/collector run over bounded channels.
//!
//! One producer walks the frontier and queues listing URLs, `workers`
//! workers turn URLs into validated listings, and one collector writes
//! them to the sink in batches. Each role hands exactly one termination
//! token per downstream consumer when it is done, so the run ends once the
//! collector has seen a token from every worker and flushed the remainder.
//! All three roles are polled on the caller's task.

use carwatch_core::{validate_listing, CarListing, ListingSink, ScraperSettings};
use chrono::Utc;
use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};

use crate::error::ScraperError;
use crate::extract::{extract_listing, Extraction};
use crate::fetch::PageFetch;
use crate::frontier::Frontier;
use crate::phone::lookup_phone;

/// Queue element: a unit of work or the end-of-stream token.
#[derive(Debug)]
enum Queued<T> {
    Item(T),
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub start_url: String,
    /// Origin listing links are anchored at.
    pub listing_origin: String,
    /// `0` means no page limit.
    pub max_pages: usize,
    pub workers: usize,
    pub batch_size: usize,
    /// Popup endpoint for phone lookups; `None` disables them.
    pub phone_lookup_url: Option<String>,
    /// Drop URLs the sink already stores before queueing them.
    pub skip_known_urls: bool,
}

impl PipelineConfig {
    #[must_use]
    pub fn from_settings(settings: &ScraperSettings) -> Self {
        Self {
            start_url: settings.start_url.clone(),
            listing_origin: settings.listing_origin.clone(),
            max_pages: settings.max_pages,
            workers: settings.concurrency,
            batch_size: settings.batch_size,
            phone_lookup_url: settings
                .phone_lookup_enabled
                .then(|| settings.phone_lookup_url.clone()),
            skip_known_urls: settings.skip_known_urls,
        }
    }
}

/// Counters for one completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Search pages requested.
    pub pages: usize,
    /// Distinct listing URLs found on search pages.
    pub discovered: usize,
    /// URLs skipped because the sink already had them.
    pub skipped_known: usize,
    pub queued: usize,
    /// URLs that produced no listing (empty page, validation failure).
    pub dropped: usize,
    /// Validated listings handed to the collector.
    pub records: usize,
    /// Rows actually written by the sink.
    pub stored: u64,
    pub flushes: usize,
    /// Worker termination tokens observed by the collector.
    pub tokens: usize,
}

#[derive(Debug, Default)]
struct ProducerStats {
    pages: usize,
    discovered: usize,
    skipped_known: usize,
    queued: usize,
}

#[derive(Debug, Default)]
struct CollectorStats {
    records: usize,
    stored: u64,
    flushes: usize,
    tokens: usize,
}

pub struct Pipeline<'a, F: PageFetch + ?Sized, S: ListingSink + ?Sized> {
    fetcher: &'a F,
    sink: &'a S,
    config: PipelineConfig,
}

impl<'a, F: PageFetch + ?Sized, S: ListingSink + ?Sized> Pipeline<'a, F, S> {
    pub fn new(fetcher: &'a F, sink: &'a S, config: PipelineConfig) -> Self {
        Self {
            fetcher,
            sink,
            config,
        }
    }

    /// Runs one crawl to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Sink`] if a batch insert fails. The remaining
    /// roles are cancelled and already-written batches stay written.
    pub async fn run(&self) -> Result<RunSummary, ScraperError> {
        let workers = self.config.workers.max(1);
        let batch_size = self.config.batch_size.max(1);
        tracing::info!(
            start_url = %self.config.start_url,
            max_pages = self.config.max_pages,
            workers,
            batch_size,
            phone_lookup = self.config.phone_lookup_url.is_some(),
            "pipeline: run starting"
        );

        let (url_tx, url_rx) = mpsc::channel::<Queued<String>>(2 * workers);
        let (record_tx, record_rx) = mpsc::channel::<Queued<CarListing>>(2 * batch_size);
        let url_rx = Mutex::new(url_rx);
        let url_rx = &url_rx;

        let producer = async { Ok::<_, ScraperError>(self.produce(url_tx, workers).await) };
        let pool = async move {
            let dropped = join_all(
                (0..workers).map(|id| self.work(id, url_rx, record_tx.clone())),
            )
            .await;
            Ok::<_, ScraperError>(dropped.into_iter().sum::<usize>())
        };
        let collector = self.collect(record_rx, workers, batch_size);

        let (produced, dropped, collected) = tokio::try_join!(producer, pool, collector)?;

        let summary = RunSummary {
            pages: produced.pages,
            discovered: produced.discovered,
            skipped_known: produced.skipped_known,
            queued: produced.queued,
            dropped,
            records: collected.records,
            stored: collected.stored,
            flushes: collected.flushes,
            tokens: collected.tokens,
        };
        tracing::info!(
            pages = summary.pages,
            discovered = summary.discovered,
            skipped_known = summary.skipped_known,
            dropped = summary.dropped,
            records = summary.records,
            stored = summary.stored,
            flushes = summary.flushes,
            "pipeline: run complete"
        );
        Ok(summary)
    }

    async fn produce(&self, tx: mpsc::Sender<Queued<String>>, workers: usize) -> ProducerStats {
        let mut frontier = Frontier::new(
            self.fetcher,
            &self.config.start_url,
            &self.config.listing_origin,
            self.config.max_pages,
        );
        let mut stats = ProducerStats::default();

        'pages: while let Some(batch) = frontier.next_batch().await {
            let batch = if self.config.skip_known_urls {
                let before = batch.len();
                let fresh = self.drop_known(batch).await;
                stats.skipped_known += before - fresh.len();
                fresh
            } else {
                batch
            };
            for url in batch {
                if tx.send(Queued::Item(url)).await.is_err() {
                    tracing::warn!("producer: URL queue closed early");
                    break 'pages;
                }
                stats.queued += 1;
            }
        }

        stats.pages = frontier.pages_visited();
        stats.discovered = frontier.discovered();
        for _ in 0..workers {
            if tx.send(Queued::Done).await.is_err() {
                break;
            }
        }
        tracing::debug!(queued = stats.queued, "producer: done");
        stats
    }

    async fn drop_known(&self, batch: Vec<String>) -> Vec<String> {
        match self.sink.existing_urls(&batch).await {
            Ok(known) if known.is_empty() => batch,
            Ok(known) => batch.into_iter().filter(|url| !known.contains(url)).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "producer: known-URL lookup failed; queueing all");
                batch
            }
        }
    }

    /// Returns the number of URLs this worker dropped.
    async fn work(
        &self,
        id: usize,
        urls: &Mutex<mpsc::Receiver<Queued<String>>>,
        records: mpsc::Sender<Queued<CarListing>>,
    ) -> usize {
        let mut dropped = 0;
        loop {
            let next = urls.lock().await.recv().await;
            let url = match next {
                Some(Queued::Item(url)) => url,
                Some(Queued::Done) | None => break,
            };
            match self.scrape_one(&url).await {
                Ok(listing) => {
                    if records.send(Queued::Item(listing)).await.is_err() {
                        tracing::warn!(worker = id, "worker: record queue closed early");
                        return dropped;
                    }
                }
                Err(e) => {
                    tracing::warn!(worker = id, url = %url, error = %e, "worker: listing dropped");
                    dropped += 1;
                }
            }
        }
        if records.send(Queued::Done).await.is_err() {
            tracing::warn!(worker = id, "worker: record queue closed before termination");
        }
        tracing::debug!(worker = id, dropped, "worker: done");
        dropped
    }

    async fn scrape_one(&self, url: &str) -> Result<CarListing, ScraperError> {
        let html = self.fetcher.get(url).await;
        if html.is_empty() {
            return Err(ScraperError::EmptyResponse {
                url: url.to_owned(),
            });
        }

        let Extraction {
            mut fields,
            lookup,
            missing,
        } = extract_listing(&html, url);

        if let (Some(endpoint), Some(meta)) = (&self.config.phone_lookup_url, &lookup) {
            fields.phone_number = lookup_phone(self.fetcher, endpoint, url, meta).await;
        }

        if missing.has_required() {
            tracing::warn!(url, missing = %missing.joined(), "worker: fields unresolved after every source");
        } else if !missing.is_empty() {
            tracing::info!(url, missing = %missing.joined(), "worker: optional fields unresolved");
        }

        validate_listing(fields, Utc::now()).map_err(|source| ScraperError::Validation {
            url: url.to_owned(),
            source,
        })
    }

    async fn collect(
        &self,
        mut rx: mpsc::Receiver<Queued<CarListing>>,
        workers: usize,
        batch_size: usize,
    ) -> Result<CollectorStats, ScraperError> {
        let mut stats = CollectorStats::default();
        let mut batch = Vec::with_capacity(batch_size);

        while stats.tokens < workers {
            match rx.recv().await {
                Some(Queued::Item(listing)) => {
                    stats.records += 1;
                    batch.push(listing);
                    if batch.len() >= batch_size {
                        self.flush(&mut batch, &mut stats).await?;
                    }
                }
                Some(Queued::Done) => stats.tokens += 1,
                None => break,
            }
        }
        self.flush(&mut batch, &mut stats).await?;
        Ok(stats)
    }

    async fn flush(
        &self,
        batch: &mut Vec<CarListing>,
        stats: &mut CollectorStats,
    ) -> Result<(), ScraperError> {
        if batch.is_empty() {
            return Ok(());
        }
        let written = self
            .sink
            .insert_batch(batch)
            .await
            .map_err(|e| ScraperError::Sink {
                source: Box::new(e),
            })?;
        tracing::info!(batch = batch.len(), written, "collector: batch flushed");
        stats.stored += written;
        stats.flushes += 1;
        batch.clear();
        Ok(())
    }
}
