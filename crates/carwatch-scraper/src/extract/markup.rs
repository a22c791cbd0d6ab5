//! Direct scans of the listing page markup and its summary texts.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title>(.*?)</title>").expect("valid regex"));

static META_DESC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta\s+name="description"\s+content="(.*?)""#).expect("valid regex")
});

static OG_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta\s+property="og:image"\s+content="(.*?)""#).expect("valid regex")
});

static CAROUSEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Item\s+\d+\s+of\s+(\d+)").expect("valid regex"));

static PLATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[А-ЯІЇЄA-Z]{2}\d{4}[А-ЯІЇЄA-Z]{2}\b").expect("valid regex")
});

static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d[\d\s]{1,9})\s*\$").expect("valid regex"));

static VIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-HJ-NPR-Z0-9]{17}\b").expect("valid regex"));

static ODOMETER_THS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)пробіг\s+([\d\s]+)\s*тис\.?\s*км").expect("valid regex")
});

static ODOMETER_KM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)пробіг\s+([\d\s]+)\s*км").expect("valid regex"));

static SELLER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)продав(?:ець|ец)\s+([^,]+)").expect("valid regex"));

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z][a-zA-Z0-9]*);").expect("valid regex")
});

// Named references seen in listing titles and descriptions.
const NAMED_ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{a0}'),
    ("shy", '\u{ad}'),
    ("ensp", '\u{2002}'),
    ("emsp", '\u{2003}'),
    ("thinsp", '\u{2009}'),
    ("laquo", '«'),
    ("raquo", '»'),
    ("lsquo", '\u{2018}'),
    ("rsquo", '\u{2019}'),
    ("sbquo", '\u{201a}'),
    ("ldquo", '\u{201c}'),
    ("rdquo", '\u{201d}'),
    ("bdquo", '\u{201e}'),
    ("ndash", '\u{2013}'),
    ("mdash", '\u{2014}'),
    ("hellip", '\u{2026}'),
    ("middot", '\u{b7}'),
    ("bull", '\u{2022}'),
    ("prime", '\u{2032}'),
    ("deg", '\u{b0}'),
    ("times", '\u{d7}'),
    ("plusmn", '\u{b1}'),
    ("sup2", '\u{b2}'),
    ("sup3", '\u{b3}'),
    ("frac12", '\u{bd}'),
    ("copy", '\u{a9}'),
    ("reg", '\u{ae}'),
    ("trade", '\u{2122}'),
    ("numero", '\u{2116}'),
    ("euro", '\u{20ac}'),
    ("dollar", '$'),
    ("pound", '\u{a3}'),
    ("sect", '\u{a7}'),
];

/// Decodes numeric character references and the named entities listing
/// pages use.
/// Unknown entities are left untouched.
pub(crate) fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body
                .strip_prefix("#x")
                .or_else(|| body.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse().ok().and_then(char::from_u32)
            } else {
                NAMED_ENTITIES
                    .iter()
                    .find(|(name, _)| *name == body)
                    .map(|&(_, ch)| ch)
            };
            decoded.map_or_else(|| caps[0].to_owned(), String::from)
        })
        .into_owned()
}

fn first_group(re: &Regex, html: &str) -> Option<String> {
    let raw = re.captures(html)?.get(1)?.as_str();
    let text = decode_entities(raw).trim().to_owned();
    (!text.is_empty()).then_some(text)
}

fn digits(text: &str) -> Option<i64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

pub(crate) fn title(html: &str) -> Option<String> {
    first_group(&TITLE_RE, html)
}

pub(crate) fn meta_description(html: &str) -> Option<String> {
    first_group(&META_DESC_RE, html)
}

pub(crate) fn og_image(html: &str) -> Option<String> {
    first_group(&OG_IMAGE_RE, html)
}

/// Total from the gallery caption `Item N of M`.
pub(crate) fn carousel_total(html: &str) -> Option<i64> {
    digits(CAROUSEL_RE.captures(html)?.get(1)?.as_str())
}

/// `12 500 $` style price, whitespace removed.
pub(crate) fn price_usd(text: &str) -> Option<String> {
    let raw = PRICE_RE.captures(text)?.get(1)?.as_str();
    Some(raw.chars().filter(|c| !c.is_whitespace()).collect())
}

/// Mileage in kilometres; `тис. км` readings are scaled by 1000.
pub(crate) fn odometer(description: &str) -> Option<i64> {
    if let Some(caps) = ODOMETER_THS_RE.captures(description) {
        return digits(&caps[1]).map(|n| n.saturating_mul(1000));
    }
    digits(&ODOMETER_KM_RE.captures(description)?[1])
}

/// Seller name from `продавець <name> на ...`.
pub(crate) fn seller(description: &str) -> Option<String> {
    let raw = SELLER_RE.captures(description)?.get(1)?.as_str();
    let name = raw.split(" на ").next().unwrap_or(raw).trim();
    (!name.is_empty()).then(|| name.to_owned())
}

pub(crate) fn plate(text: &str) -> Option<String> {
    PLATE_RE.find(text).map(|m| m.as_str().to_owned())
}

pub(crate) fn vin(text: &str) -> Option<String> {
    VIN_RE.find(text).map(|m| m.as_str().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_decoded_and_trimmed() {
        let html = "<head><TITLE>\n Audi A4 &amp; Co &#8212; 12&nbsp;500 $ </TITLE></head>";
        assert_eq!(
            title(html).as_deref(),
            Some("Audi A4 & Co \u{2014} 12\u{a0}500 $")
        );
    }

    #[test]
    fn meta_and_og_image_are_case_insensitive() {
        let html = r#"<META name="description" content="Продавець Іван"><meta property="og:image" content="https://cdn/x.jpg?a=1&amp;b=2">"#;
        assert_eq!(meta_description(html).as_deref(), Some("Продавець Іван"));
        assert_eq!(og_image(html).as_deref(), Some("https://cdn/x.jpg?a=1&b=2"));
    }

    #[test]
    fn typographic_entities_are_decoded() {
        assert_eq!(
            decode_entities("&laquo;Ford&raquo; &ndash; 2019&hellip; &#x41;&copy;"),
            "«Ford» \u{2013} 2019\u{2026} A\u{a9}"
        );
        assert_eq!(decode_entities("180&nbsp;тис.&nbsp;км"), "180\u{a0}тис.\u{a0}км");
    }

    #[test]
    fn unknown_entities_are_kept() {
        assert_eq!(decode_entities("a &bogus; b"), "a &bogus; b");
    }

    #[test]
    fn carousel_caption_gives_total() {
        assert_eq!(carousel_total("<span>item 1 of 23</span>"), Some(23));
        assert_eq!(carousel_total("no gallery"), None);
    }

    #[test]
    fn price_accepts_grouped_digits() {
        assert_eq!(price_usd("BMW X5 2018 · 27 900 $").as_deref(), Some("27900"));
        assert_eq!(price_usd("BMW X5 2018").as_deref(), None);
    }

    #[test]
    fn odometer_scales_thousands() {
        assert_eq!(odometer("Авто, пробіг 95 тис. км, дизель"), Some(95_000));
        assert_eq!(odometer("Авто, пробіг 800 км"), Some(800));
        assert_eq!(odometer("без пробігу"), None);
    }

    #[test]
    fn seller_stops_before_location() {
        assert_eq!(
            seller("Продається авто, продавець Олег на AUTO.RIA, Київ").as_deref(),
            Some("Олег")
        );
        assert_eq!(seller("Продавец Анна, Львів").as_deref(), Some("Анна"));
    }

    #[test]
    fn plate_and_vin_patterns() {
        let title = "Skoda Octavia AA1234BB WVWZZZ1JZXW000001";
        assert_eq!(plate(title).as_deref(), Some("AA1234BB"));
        assert_eq!(vin(title).as_deref(), Some("WVWZZZ1JZXW000001"));
        assert_eq!(plate("КА0001ІХ").as_deref(), Some("КА0001ІХ"));
    }
}
