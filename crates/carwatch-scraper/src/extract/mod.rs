//! Listing page extraction.
//!
//! A listing page carries its data twice: in an embedded state payload and
//! in plain markup (title, meta tags, gallery caption). Every field is
//! resolved through an ordered chain of sources, payload first, so pages
//! with a missing or malformed payload still yield what the markup offers.
//! Extraction never fails; unresolved fields are reported instead.

mod deep;
mod markup;
mod payload;
mod resolvers;

use carwatch_core::{FieldMap, MissingReport};

use resolvers::{resolve, Sources};

/// Identifiers needed to request a seller's phone number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupMeta {
    pub auto_id: String,
    pub user_id: String,
    pub phone_id: String,
    pub title: String,
    pub avatar: String,
    pub user_name: String,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub fields: FieldMap,
    /// Present only when auto, user, and phone ids all resolved.
    pub lookup: Option<LookupMeta>,
    pub missing: MissingReport,
}

/// Resolves listing fields from the page text fetched from `url`.
#[must_use]
pub fn extract_listing(html: &str, url: &str) -> Extraction {
    let payload = payload::extract_payload(html);
    let sources = Sources::new(html, payload.as_ref());

    let fields = FieldMap {
        url: url.to_owned(),
        title: resolve("title", resolvers::TITLE, &sources),
        price_usd: resolve("price_usd", resolvers::PRICE_USD, &sources),
        odometer: resolve("odometer", resolvers::ODOMETER, &sources),
        username: resolve("username", resolvers::USERNAME, &sources),
        phone_number: None,
        image_url: resolve("image_url", resolvers::IMAGE_URL, &sources),
        images_count: resolve("images_count", resolvers::IMAGES_COUNT, &sources),
        car_number: resolve("car_number", resolvers::CAR_NUMBER, &sources),
        car_vin: resolve("car_vin", resolvers::CAR_VIN, &sources),
    };

    let mut missing = MissingReport::default();
    let checks = [
        ("title", fields.title.is_none()),
        ("price_usd", fields.price_usd.is_none()),
        ("odometer", fields.odometer.is_none()),
        ("username", fields.username.is_none()),
        ("image_url", fields.image_url.is_none()),
        ("images_count", fields.images_count.is_none()),
        ("car_number", fields.car_number.is_none()),
        ("car_vin", fields.car_vin.is_none()),
    ];
    for (name, absent) in checks {
        if absent {
            missing.record(name);
        }
    }

    let lookup = lookup_meta(&sources, &fields);
    Extraction {
        fields,
        lookup,
        missing,
    }
}

fn lookup_meta(sources: &Sources<'_>, fields: &FieldMap) -> Option<LookupMeta> {
    let auto_id = resolve("autoId", resolvers::AUTO_ID, sources);
    let user_id = resolve("userId", resolvers::USER_ID, sources);
    let phone_id = resolve("phoneId", resolvers::PHONE_ID, sources);
    let (Some(auto_id), Some(user_id), Some(phone_id)) = (auto_id, user_id, phone_id) else {
        return None;
    };
    Some(LookupMeta {
        auto_id,
        user_id,
        phone_id,
        title: fields.title.clone().unwrap_or_default(),
        avatar: resolve("avatar", resolvers::AVATAR, sources).unwrap_or_default(),
        user_name: fields.username.clone().unwrap_or_default(),
    })
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
