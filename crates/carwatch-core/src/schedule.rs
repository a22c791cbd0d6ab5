//! Wall-clock schedule for the recurring scrape and dump jobs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, NaiveTime, TimeZone};
use chrono_tz::Tz;

/// A strict `HH:MM` time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
}

impl ClockTime {
    /// Six-field cron expression (`sec min hour dom month dow`) firing daily
    /// at this time.
    #[must_use]
    pub fn cron_expression(self) -> String {
        format!("0 {} {} * * *", self.minute, self.hour)
    }

    /// The latest daily occurrence of this time that is not after `now`,
    /// in `now`'s timezone.
    ///
    /// Returns `None` when the local time does not exist on either candidate
    /// day (a DST gap).
    #[must_use]
    pub fn latest_occurrence<T: TimeZone>(self, now: &DateTime<T>) -> Option<DateTime<T>> {
        let time = NaiveTime::from_hms_opt(self.hour, self.minute, 0)?;
        let today = now.date_naive().and_time(time);
        let tz = now.timezone();
        let candidate = tz.from_local_datetime(&today).earliest()?;
        if candidate <= *now {
            return Some(candidate);
        }
        let yesterday = today.checked_sub_days(Days::new(1))?;
        tz.from_local_datetime(&yesterday).earliest()
    }
}

impl FromStr for ClockTime {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let bytes = value.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(format!("invalid time format: {value} (expected HH:MM)"));
        }
        let two_digits = |part: &str| -> Option<u32> {
            if part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit()) {
                part.parse().ok()
            } else {
                None
            }
        };
        let hour = two_digits(&value[..2]);
        let minute = two_digits(&value[3..]);
        match (hour, minute) {
            (Some(hour), Some(minute)) if hour <= 23 && minute <= 59 => Ok(Self { hour, minute }),
            (Some(_), Some(_)) => Err(format!("invalid time: {value}")),
            _ => Err(format!("invalid time format: {value} (expected HH:MM)")),
        }
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub timezone: Tz,
    pub scrape_time: ClockTime,
    pub dump_time: ClockTime,
    pub run_on_startup: bool,
}
