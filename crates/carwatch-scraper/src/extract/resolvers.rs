//! Ordered resolver tables, one per listing field.
//!
//! Each table lists named sources from most to least trusted; the first
//! source producing a non-blank value wins.

use std::borrow::Cow;

use carwatch_core::FieldValue;
use serde_json::Value;

use super::deep::{first_int, first_text, scalar_text};
use super::markup;
use super::payload;

/// Everything a resolver may read for one page.
pub(crate) struct Sources<'a> {
    pub html: &'a str,
    pub payload: Option<&'a Value>,
    pub additional: Option<&'a Value>,
    pub ld: Option<Cow<'a, Value>>,
    pub photos: &'a [Value],
    pub title_tag: Option<String>,
    pub description: Option<String>,
    pub og_image: Option<String>,
}

impl<'a> Sources<'a> {
    pub(crate) fn new(html: &'a str, payload: Option<&'a Value>) -> Self {
        let root = payload.and_then(payload::listing_root);
        let additional = root.and_then(|r| r.get("additionalParams"));
        let ld = root.and_then(|r| r.get("ldJSON")).and_then(|ld| match ld {
            Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
                Ok(parsed) => Some(Cow::Owned(parsed)),
                Err(e) => {
                    tracing::debug!(error = %e, "extract: ldJSON string is not valid JSON");
                    None
                }
            },
            Value::Object(_) => Some(Cow::Borrowed(ld)),
            _ => None,
        });
        let photos = root
            .and_then(|r| r.pointer("/photoLdJSON/image"))
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice);

        Self {
            html,
            payload,
            additional,
            ld,
            photos,
            title_tag: markup::title(html),
            description: markup::meta_description(html),
            og_image: markup::og_image(html),
        }
    }

    fn additional_at(&self, pointer: &str) -> Option<&'a Value> {
        self.additional?.pointer(pointer)
    }

    fn ld_at(&self, pointer: &str) -> Option<&Value> {
        self.ld.as_deref()?.pointer(pointer)
    }

    fn deep_text(&self, key: &str) -> Option<String> {
        first_text(self.payload?, key)
    }
}

/// Reads a JSON scalar as a field value without interpreting it.
#[allow(clippy::cast_possible_truncation)]
fn field_value(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .map(FieldValue::Int),
        Value::String(s) => Some(FieldValue::Text(s.trim().to_owned())),
        _ => None,
    }
}

pub(crate) trait Resolved {
    fn is_blank(&self) -> bool;
}

impl Resolved for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl Resolved for FieldValue {
    fn is_blank(&self) -> bool {
        FieldValue::is_blank(self)
    }
}

pub(crate) struct Rule<T> {
    pub source: &'static str,
    pub resolve: fn(&Sources<'_>) -> Option<T>,
}

/// Runs `rules` in order and returns the first non-blank value.
pub(crate) fn resolve<T: Resolved>(
    field: &'static str,
    rules: &[Rule<T>],
    sources: &Sources<'_>,
) -> Option<T> {
    rules.iter().find_map(|rule| {
        let value = (rule.resolve)(sources).filter(|v| !v.is_blank())?;
        tracing::trace!(field, source = rule.source, "extract: field resolved");
        Some(value)
    })
}

pub(crate) const TITLE: &[Rule<String>] = &[
    Rule {
        source: "additionalParams.title",
        resolve: |s| s.additional_at("/title").and_then(scalar_text),
    },
    Rule {
        source: "ldJSON.name",
        resolve: |s| s.ld_at("/name").and_then(scalar_text),
    },
    Rule {
        source: "<title>",
        resolve: |s| s.title_tag.clone(),
    },
];

pub(crate) const PRICE_USD: &[Rule<FieldValue>] = &[
    Rule {
        source: "ldJSON.offers.price",
        resolve: |s| {
            s.ld_at("/offers/price")
                .or_else(|| s.ld_at("/offers/0/price"))
                .and_then(field_value)
        },
    },
    Rule {
        source: "additionalParams.prices.USD",
        resolve: |s| s.additional_at("/prices/USD").and_then(field_value),
    },
    Rule {
        source: "<title> price",
        resolve: |s| {
            s.title_tag
                .as_deref()
                .and_then(markup::price_usd)
                .map(FieldValue::Text)
        },
    },
    Rule {
        source: "description price",
        resolve: |s| {
            s.description
                .as_deref()
                .and_then(markup::price_usd)
                .map(FieldValue::Text)
        },
    },
];

pub(crate) const ODOMETER: &[Rule<FieldValue>] = &[
    Rule {
        source: "ldJSON.mileageFromOdometer.value",
        resolve: |s| s.ld_at("/mileageFromOdometer/value").and_then(field_value),
    },
    Rule {
        source: "description mileage",
        resolve: |s| {
            s.description
                .as_deref()
                .and_then(markup::odometer)
                .map(FieldValue::Int)
        },
    },
];

pub(crate) const USERNAME: &[Rule<String>] = &[
    Rule {
        source: "additionalParams.owner.name",
        resolve: |s| s.additional_at("/owner/name").and_then(scalar_text),
    },
    Rule {
        source: "description seller",
        resolve: |s| s.description.as_deref().and_then(markup::seller),
    },
];

pub(crate) const IMAGE_URL: &[Rule<String>] = &[
    Rule {
        source: "mainPhoto.src",
        resolve: |s| s.additional_at("/mainPhoto/src").and_then(scalar_text),
    },
    Rule {
        source: "mainPhoto.formats.large",
        resolve: |s| s.additional_at("/mainPhoto/formats/large").and_then(scalar_text),
    },
    Rule {
        source: "mainPhoto.formats.middle",
        resolve: |s| s.additional_at("/mainPhoto/formats/middle").and_then(scalar_text),
    },
    Rule {
        source: "photoLdJSON.image[0]",
        resolve: |s| {
            let first = s.photos.first()?;
            first
                .get("contentUrl")
                .and_then(scalar_text)
                .or_else(|| first.get("image").and_then(scalar_text))
        },
    },
    Rule {
        source: "og:image",
        resolve: |s| s.og_image.clone(),
    },
];

pub(crate) const IMAGES_COUNT: &[Rule<FieldValue>] = &[
    Rule {
        source: "carousel caption",
        resolve: |s| markup::carousel_total(s.html).map(FieldValue::Int),
    },
    Rule {
        source: "photoLdJSON.image length",
        resolve: |s| i64::try_from(s.photos.len()).ok().map(FieldValue::Int),
    },
    Rule {
        source: "additionalParams count",
        resolve: |s| first_int(s.additional?, "count").map(FieldValue::Int),
    },
];

pub(crate) const CAR_VIN: &[Rule<String>] = &[
    Rule {
        source: "ldJSON.vehicleIdentificationNumber",
        resolve: |s| s.ld_at("/vehicleIdentificationNumber").and_then(scalar_text),
    },
    Rule {
        source: "deep vin",
        resolve: |s| s.deep_text("vin"),
    },
    Rule {
        source: "deep car_vin",
        resolve: |s| s.deep_text("car_vin"),
    },
    Rule {
        source: "<title> VIN",
        resolve: |s| s.title_tag.as_deref().and_then(markup::vin),
    },
];

pub(crate) const CAR_NUMBER: &[Rule<String>] = &[
    Rule {
        source: "deep carNumber",
        resolve: |s| s.deep_text("carNumber"),
    },
    Rule {
        source: "deep autoNumber",
        resolve: |s| s.deep_text("autoNumber"),
    },
    Rule {
        source: "deep car_number",
        resolve: |s| s.deep_text("car_number"),
    },
    Rule {
        source: "deep plateNumber",
        resolve: |s| s.deep_text("plateNumber"),
    },
    Rule {
        source: "<title> plate",
        resolve: |s| s.title_tag.as_deref().and_then(markup::plate),
    },
];

pub(crate) const PHONE_ID: &[Rule<String>] = &[Rule {
    source: "deep phoneId",
    resolve: |s| s.deep_text("phoneId"),
}];

pub(crate) const AUTO_ID: &[Rule<String>] = &[
    Rule {
        source: "additionalParams.autoId",
        resolve: |s| s.additional_at("/autoId").and_then(scalar_text),
    },
    Rule {
        source: "deep autoId",
        resolve: |s| s.deep_text("autoId"),
    },
];

pub(crate) const USER_ID: &[Rule<String>] = &[
    Rule {
        source: "deep userId",
        resolve: |s| s.deep_text("userId"),
    },
    Rule {
        source: "additionalParams.owner.id",
        resolve: |s| s.additional_at("/owner/id").and_then(scalar_text),
    },
];

pub(crate) const AVATAR: &[Rule<String>] = &[
    Rule {
        source: "additionalParams.owner.photo",
        resolve: |s| s.additional_at("/owner/photo").and_then(scalar_text),
    },
    Rule {
        source: "deep avatar",
        resolve: |s| s.deep_text("avatar"),
    },
];
