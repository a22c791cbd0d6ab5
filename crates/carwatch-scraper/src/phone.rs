//! Seller phone lookup through the listing's contact popup endpoint.
//!
//! Best effort: any failure (missing or non-numeric auto id, failed
//! request, unreadable response, too few digits) yields no phone number
//! and the listing is stored without one.

use serde_json::{json, Value};

use crate::extract::LookupMeta;
use crate::fetch::PageFetch;

const SRC_ANALYTIC: &str = "main_side_sellerInfo_sellerInfoPhone_showBottomPopUp";

/// Builds the popup request body, or `None` if the auto id is not numeric.
#[must_use]
pub fn build_phone_payload(meta: &LookupMeta) -> Option<Value> {
    let auto_id: i64 = meta.auto_id.trim().parse().ok()?;
    Some(json!({
        "blockId": "autoPhone",
        "popUpId": "autoPhone",
        "isLoginRequired": false,
        "isConfirmPhoneEmailRequired": false,
        "autoId": auto_id,
        "data": [
            ["userId", meta.user_id],
            ["phoneId", meta.phone_id],
            ["title", meta.title],
            ["isCheckedVin", ""],
            ["companyId", ""],
            ["companyEng", ""],
            ["avatar", meta.avatar],
            ["userName", meta.user_name],
            ["isCardPayer", "1"],
            ["dia", ""],
            ["isOnline", ""],
            ["isCompany", ""],
            ["workTime", ""],
            ["srcAnalytic", SRC_ANALYTIC],
        ],
        "params": {
            "userId": meta.user_id,
            "phoneId": meta.phone_id,
            "title": meta.title,
            "isCheckedVin": "",
            "companyId": "",
            "companyEng": "",
            "avatar": meta.avatar,
            "userName": meta.user_name,
            "isCardPayer": "1",
            "dia": "",
            "isOnline": "",
            "isCompany": "",
            "workTime": "",
        },
        "target": {},
        "formId": null,
        "langId": 4,
        "device": "desktop-web",
    }))
}

/// Canonical digits of a Ukrainian phone number.
///
/// National forms gain the country code (`0XXXXXXXXX` becomes
/// `380XXXXXXXXX`, nine bare digits get `380`). Anything shorter than 10
/// or longer than 15 digits after that is rejected.
#[must_use]
pub fn normalize_phone_digits(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let canonical = match digits.len() {
        10 if digits.starts_with('0') => format!("38{digits}"),
        9 => format!("380{digits}"),
        _ => digits,
    };
    (10..=15).contains(&canonical.len()).then_some(canonical)
}

/// Reads the phone text from a popup response body: the JSON
/// `additionalParams.phoneStr` field, or the raw body when it is not JSON.
fn phone_text(body: &str) -> Option<String> {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => match value.pointer("/additionalParams/phoneStr")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        },
        Err(_) => Some(body.to_owned()),
    }
}

/// Requests the seller's phone number for `listing_url`.
pub async fn lookup_phone<F: PageFetch + ?Sized>(
    fetcher: &F,
    endpoint: &str,
    listing_url: &str,
    meta: &LookupMeta,
) -> Option<String> {
    let Some(payload) = build_phone_payload(meta) else {
        tracing::warn!(url = listing_url, auto_id = %meta.auto_id, "phone: auto id is not numeric");
        return None;
    };

    let body = fetcher.post_json(endpoint, &payload).await;
    if body.trim().is_empty() {
        tracing::warn!(url = listing_url, "phone: empty popup response");
        return None;
    }

    let phone = phone_text(&body).and_then(|text| normalize_phone_digits(&text));
    if phone.is_none() {
        tracing::warn!(url = listing_url, "phone: no usable number in popup response");
    }
    phone
}
