//! Listing field map produced by extraction and the validated record shape
//! persisted by the sink.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Fields that may legitimately be absent from a listing.
pub const OPTIONAL_FIELDS: &[&str] = &["car_number"];

/// A raw scalar resolved from one extraction source.
///
/// Numeric parsing is deferred to [`validate_listing`]; sources hand over
/// whatever shape they found (`"12 500"` from markup, `12500` from JSON).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int(i64),
    Text(String),
}

impl FieldValue {
    /// `true` for empty or whitespace-only text and for numeric zero.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Int(n) => *n == 0,
            Self::Text(s) => s.trim().is_empty(),
        }
    }

    /// Digits-only integer reading of the value. A decimal fraction
    /// (`"12500.00"`, `"7,5"`) is cut off before the digits are collected.
    #[must_use]
    pub fn as_digits_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Text(s) => {
                let digits: String = integer_part(s)
                    .chars()
                    .filter(char::is_ascii_digit)
                    .collect();
                if digits.is_empty() {
                    None
                } else {
                    digits.parse().ok()
                }
            }
        }
    }
}

// A `.` or `,` between a digit and a run of one or two digits starts a
// fraction; three digits after it are a thousands group.
fn integer_part(text: &str) -> &str {
    for (i, c) in text.char_indices() {
        if c != '.' && c != ',' {
            continue;
        }
        let after_digit = text[..i].chars().next_back().is_some_and(|p| p.is_ascii_digit());
        let run = text[i + 1..].chars().take_while(char::is_ascii_digit).count();
        if after_digit && (1..=2).contains(&run) {
            return &text[..i];
        }
    }
    text
}

/// Listing fields resolved from one page, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    pub url: String,
    pub title: Option<String>,
    pub price_usd: Option<FieldValue>,
    pub odometer: Option<FieldValue>,
    pub username: Option<String>,
    pub phone_number: Option<String>,
    pub image_url: Option<String>,
    pub images_count: Option<FieldValue>,
    pub car_number: Option<String>,
    pub car_vin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingField {
    pub name: &'static str,
    pub optional: bool,
}

/// Field names left unresolved after every source was tried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingReport {
    fields: Vec<MissingField>,
}

impl MissingReport {
    pub fn record(&mut self, name: &'static str) {
        self.fields.push(MissingField {
            name,
            optional: OPTIONAL_FIELDS.contains(&name),
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn required(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|f| !f.optional).map(|f| f.name)
    }

    pub fn optional(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|f| f.optional).map(|f| f.name)
    }

    #[must_use]
    pub fn has_required(&self) -> bool {
        self.fields.iter().any(|f| !f.optional)
    }

    /// Comma-separated names, for log lines.
    #[must_use]
    pub fn joined(&self) -> String {
        self.fields
            .iter()
            .map(|f| f.name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A validated listing ready for insertion into `car_listings`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarListing {
    pub url: String,
    pub title: String,
    pub price_usd: Option<i64>,
    pub odometer: Option<i64>,
    pub username: String,
    pub phone_number: Option<i64>,
    pub image_url: Option<String>,
    pub images_count: i32,
    pub car_number: Option<String>,
    pub car_vin: Option<String>,
    pub datetime_found: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("required field {0} is missing")]
    MissingField(&'static str),

    #[error("field {field} is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Normalizes a [`FieldMap`] into a [`CarListing`] stamped with `found_at`.
///
/// `url`, `title` and `username` are required. Numeric fields are read as
/// digits only; an odometer given in thousands (`"120 тис. км"`) is scaled to
/// kilometres. Phone numbers that are not 9–15 digits long are dropped rather
/// than failing the record.
///
/// # Errors
///
/// Returns [`ValidationError::MissingField`] for an absent required field and
/// [`ValidationError::InvalidField`] for a value that cannot be represented.
pub fn validate_listing(
    fields: FieldMap,
    found_at: DateTime<Utc>,
) -> Result<CarListing, ValidationError> {
    let url = fields.url.trim().to_string();
    if url.is_empty() {
        return Err(ValidationError::MissingField("url"));
    }
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(ValidationError::InvalidField {
            field: "url",
            reason: format!("not an http(s) URL: {url}"),
        });
    }

    let title = required_text(fields.title, "title")?;
    let username = required_text(fields.username, "username")?;

    let price_usd = fields.price_usd.as_ref().and_then(FieldValue::as_digits_i64);
    let odometer = fields.odometer.as_ref().and_then(parse_odometer);
    let phone_number = fields.phone_number.as_deref().and_then(parse_phone);

    let images_count = match fields.images_count.as_ref().and_then(FieldValue::as_digits_i64) {
        Some(n) => i32::try_from(n).map_err(|_| ValidationError::InvalidField {
            field: "images_count",
            reason: format!("{n} is out of range"),
        })?,
        None => 0,
    };

    Ok(CarListing {
        url,
        title,
        price_usd,
        odometer,
        username,
        phone_number,
        image_url: optional_text(fields.image_url),
        images_count,
        car_number: optional_text(fields.car_number),
        car_vin: optional_text(fields.car_vin).map(|v| v.to_ascii_uppercase()),
        datetime_found: found_at,
    })
}

fn required_text(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    optional_text(value).ok_or(ValidationError::MissingField(field))
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_odometer(value: &FieldValue) -> Option<i64> {
    let base = value.as_digits_i64()?;
    match value {
        FieldValue::Text(s) if s.to_lowercase().contains("тис") => base.checked_mul(1000),
        _ => Some(base),
    }
}

fn parse_phone(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if (9..=15).contains(&digits.len()) {
        digits.parse().ok()
    } else {
        None
    }
}
