use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;

use crate::app_config::{AppConfig, ScraperSettings};
use crate::schedule::{ClockTime, ScheduleConfig};
use crate::ConfigError;

const MIN_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

fn invalid(var: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can pass a `HashMap` lookup.
#[allow(clippy::too_many_lines)]
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e))
    };

    let parse_secs = |var: &str, default: &str| -> Result<Duration, ConfigError> {
        let raw = or_default(var, default);
        let secs = raw.parse::<f64>().map_err(|e| invalid(var, e))?;
        Duration::try_from_secs_f64(secs).map_err(|e| invalid(var, e))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        parse_flag(&or_default(var, default))
            .ok_or_else(|| invalid(var, "expected true/false, 1/0, yes/no or on/off"))
    };

    let parse_clock = |var: &str, default: &str| -> Result<ClockTime, ConfigError> {
        or_default(var, default)
            .parse::<ClockTime>()
            .map_err(|reason| invalid(var, reason))
    };

    let database_url = require("DATABASE_URL")?;
    let log_level = or_default("CARWATCH_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("CARWATCH_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("CARWATCH_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("CARWATCH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;
    let dumps_dir = PathBuf::from(or_default("CARWATCH_DUMPS_DIR", "dumps"));

    let start_url = or_default("CARWATCH_START_URL", "https://auto.ria.com/uk/car/used/");
    let listing_origin = or_default("CARWATCH_LISTING_ORIGIN", "https://auto.ria.com")
        .trim_end_matches('/')
        .to_string();
    let max_pages = parse_usize("CARWATCH_MAX_PAGES", "0")?;
    let concurrency = parse_usize("CARWATCH_CONCURRENCY", "5")?.max(1);
    let request_timeout_secs =
        parse_u64("CARWATCH_REQUEST_TIMEOUT_SECS", "30")?.max(MIN_REQUEST_TIMEOUT_SECS);
    let batch_size = parse_usize("CARWATCH_BATCH_SIZE", "100")?.max(1);
    let max_attempts = parse_u32("CARWATCH_RETRIES", "3")?.max(1);
    let jitter_min = parse_secs("CARWATCH_JITTER_MIN_SECS", "0.5")?;
    let jitter_max = parse_secs("CARWATCH_JITTER_MAX_SECS", "1.5")?;
    if jitter_min > jitter_max {
        return Err(invalid(
            "CARWATCH_JITTER_MIN_SECS",
            "must not exceed CARWATCH_JITTER_MAX_SECS",
        ));
    }
    let backoff_base = parse_secs("CARWATCH_BACKOFF_BASE_SECS", "1.0")?;
    let backoff_max = parse_secs("CARWATCH_BACKOFF_MAX_SECS", "30.0")?;
    let phone_lookup_enabled = parse_bool("CARWATCH_PHONE_LOOKUP", "false")?;
    let phone_lookup_url = or_default(
        "CARWATCH_PHONE_LOOKUP_URL",
        "https://auto.ria.com/bff/final-page/public/auto/popUp/",
    );
    let skip_known_urls = parse_bool("CARWATCH_SKIP_KNOWN", "false")?;

    let timezone_raw = or_default("CARWATCH_TIMEZONE", "Europe/Kyiv");
    let timezone = timezone_raw
        .parse::<Tz>()
        .map_err(|e| invalid("CARWATCH_TIMEZONE", e))?;
    let scrape_time = parse_clock("CARWATCH_SCRAPE_TIME", "12:00")?;
    let dump_time = parse_clock("CARWATCH_DUMP_TIME", "00:00")?;
    let run_on_startup = parse_bool("CARWATCH_RUN_ON_STARTUP", "false")?;

    Ok(AppConfig {
        database_url,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        dumps_dir,
        scraper: ScraperSettings {
            start_url,
            listing_origin,
            max_pages,
            concurrency,
            request_timeout_secs,
            batch_size,
            max_attempts,
            jitter_min,
            jitter_max,
            backoff_base,
            backoff_max,
            phone_lookup_enabled,
            phone_lookup_url,
            skip_known_urls,
        },
        schedule: ScheduleConfig {
            timezone,
            scrape_time,
            dump_time,
            run_on_startup,
        },
    })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
