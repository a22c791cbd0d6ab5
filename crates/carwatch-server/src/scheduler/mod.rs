//! Background job scheduler.
//!
//! Registers the daily scrape and the daily database dump at their local
//! times in the configured timezone. Both jobs share one [`JobGuard`]: a
//! scrape that fires while the dump runs is skipped, a dump that fires while
//! a scrape runs waits for it.

mod guard;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use carwatch_core::{AppConfig, ClockTime};
use carwatch_db::PgListingStore;
use carwatch_scraper::{FetchPolicy, HttpFetcher, Pipeline, PipelineConfig};
use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

pub use guard::{GuardMode, JobGuard, JobRun};

/// Firings later than this after their scheduled time are dropped.
const MISFIRE_GRACE: TimeDelta = TimeDelta::minutes(30);

const SCRAPE_JOB: &str = "scrape";
const DUMP_JOB: &str = "dump";

/// Per-job firing state: one run in flight at a time, later firings fold
/// into it.
#[derive(Debug)]
struct JobSlot {
    name: &'static str,
    at: ClockTime,
    in_flight: AtomicBool,
}

/// Clears the slot's in-flight flag when the run ends.
struct InFlight<'a>(&'a JobSlot);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

impl JobSlot {
    fn new(name: &'static str, at: ClockTime) -> Self {
        Self {
            name,
            at,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Claims the slot unless a run is already in flight.
    fn begin(&self) -> Option<InFlight<'_>> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            tracing::info!(job = self.name, "scheduler: run already in flight; firing coalesced");
            return None;
        }
        Some(InFlight(self))
    }

    /// Whether a firing observed at `now` is still within the grace window
    /// of its most recent scheduled time.
    fn within_grace(&self, now: DateTime<Tz>) -> bool {
        self.at
            .latest_occurrence(&now)
            .is_none_or(|scheduled| now.signed_duration_since(scheduled) <= MISFIRE_GRACE)
    }
}

struct JobContext {
    guard: JobGuard,
    store: PgListingStore,
    config: Arc<AppConfig>,
    scrape: JobSlot,
    dump: JobSlot,
}

impl JobContext {
    async fn fire(&self, slot: &JobSlot, mode: GuardMode, scheduled: bool) -> Option<JobRun> {
        if scheduled {
            let now = Utc::now().with_timezone(&self.config.schedule.timezone);
            if !slot.within_grace(now) {
                tracing::warn!(job = slot.name, "scheduler: firing past grace window; dropped");
                return None;
            }
        }
        let _in_flight = slot.begin()?;

        let run = if slot.name == DUMP_JOB {
            self.guard
                .run(slot.name, mode, || run_dump(&self.config))
                .await
        } else {
            self.guard
                .run(slot.name, mode, || run_scrape(&self.store, &self.config))
                .await
        };
        Some(run)
    }

    async fn fire_scrape(&self, scheduled: bool) -> Option<JobRun> {
        self.fire(&self.scrape, GuardMode::Skip, scheduled).await
    }

    async fn fire_dump(&self) -> Option<JobRun> {
        self.fire(&self.dump, GuardMode::Wait, true).await
    }
}

/// One full crawl into the listing store.
async fn run_scrape(store: &PgListingStore, config: &AppConfig) -> anyhow::Result<()> {
    let fetcher = HttpFetcher::new(FetchPolicy::from_settings(&config.scraper))
        .context("failed to build HTTP fetcher")?;
    let summary = Pipeline::new(&fetcher, store, PipelineConfig::from_settings(&config.scraper))
        .run()
        .await?;
    tracing::info!(
        stored = summary.stored,
        dropped = summary.dropped,
        "scheduler: scrape summary"
    );
    Ok(())
}

async fn run_dump(config: &AppConfig) -> anyhow::Result<()> {
    let path = carwatch_db::create_dump(&config.database_url, &config.dumps_dir).await?;
    tracing::info!(path = %path.display(), "scheduler: dump written");
    Ok(())
}

/// Builds and starts the job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process; dropping it shuts down all jobs. When
/// `run_on_startup` is set, one scrape is also spawned immediately under
/// the same guard.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    store: PgListingStore,
    config: Arc<AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let schedule = &config.schedule;
    let ctx = Arc::new(JobContext {
        guard: JobGuard::new(),
        store,
        scrape: JobSlot::new(SCRAPE_JOB, schedule.scrape_time),
        dump: JobSlot::new(DUMP_JOB, schedule.dump_time),
        config: Arc::clone(&config),
    });

    let scheduler = JobScheduler::new().await?;
    register_scrape_job(&scheduler, Arc::clone(&ctx)).await?;
    register_dump_job(&scheduler, Arc::clone(&ctx)).await?;
    scheduler.start().await?;

    tracing::info!(
        timezone = %schedule.timezone,
        scrape_at = %schedule.scrape_time,
        dump_at = %schedule.dump_time,
        "scheduler: jobs registered"
    );

    if schedule.run_on_startup {
        tokio::spawn(async move {
            tracing::info!("scheduler: startup scrape requested");
            ctx.fire_scrape(false).await;
        });
    }

    Ok(scheduler)
}

/// Register the daily scrape at `CARWATCH_SCRAPE_TIME` local time.
async fn register_scrape_job(
    scheduler: &JobScheduler,
    ctx: Arc<JobContext>,
) -> Result<(), JobSchedulerError> {
    let cron = ctx.config.schedule.scrape_time.cron_expression();
    let tz = ctx.config.schedule.timezone;

    let job = Job::new_async_tz(cron.as_str(), tz, move |_uuid, _lock| {
        let ctx = Arc::clone(&ctx);
        Box::pin(async move {
            ctx.fire_scrape(true).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Register the daily dump at `CARWATCH_DUMP_TIME` local time.
async fn register_dump_job(
    scheduler: &JobScheduler,
    ctx: Arc<JobContext>,
) -> Result<(), JobSchedulerError> {
    let cron = ctx.config.schedule.dump_time.cron_expression();
    let tz = ctx.config.schedule.timezone;

    let job = Job::new_async_tz(cron.as_str(), tz, move |_uuid, _lock| {
        let ctx = Arc::clone(&ctx);
        Box::pin(async move {
            ctx.fire_dump().await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono_tz::Europe::Kyiv;

    use super::*;

    fn slot() -> JobSlot {
        JobSlot::new(SCRAPE_JOB, ClockTime { hour: 12, minute: 0 })
    }

    #[test]
    fn on_time_firing_is_admitted() {
        let now = Kyiv.with_ymd_and_hms(2026, 5, 1, 12, 0, 3).unwrap();
        assert!(slot().within_grace(now));
    }

    #[test]
    fn firing_inside_grace_window_is_admitted() {
        let now = Kyiv.with_ymd_and_hms(2026, 5, 1, 12, 29, 0).unwrap();
        assert!(slot().within_grace(now));
    }

    #[test]
    fn late_firing_is_dropped() {
        let now = Kyiv.with_ymd_and_hms(2026, 5, 1, 12, 31, 0).unwrap();
        assert!(!slot().within_grace(now));
    }

    #[test]
    fn second_firing_coalesces_into_running_one() {
        let slot = slot();
        let first = slot.begin();
        assert!(first.is_some());
        assert!(slot.begin().is_none());
        drop(first);
        assert!(slot.begin().is_some());
    }
}
