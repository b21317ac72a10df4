//! Field extractors
//!
//! Pure functions turning located nodes and attribute strings into typed
//! values. Date and duration failures are hard errors for the document
//! being parsed; entity decoding never fails.

use super::tree::{DocumentNode, Pattern, Step};
use crate::error::{Error, Result};
use crate::types::Label;
use chrono::{DateTime, Duration, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d\d+):(\d\d):(\d\d)").expect("Invalid duration regex"));

static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#?\w+;").expect("Invalid entity regex"));

/// Tag links carrying the category of a telephony page
const TAG_LINKS: Pattern = Pattern::new(&[
    Step::child("div").with("class", "tags"),
    Step::child("a").with("rel", "tag"),
]);

/// Offset-aware layouts tried after RFC 3339
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%z",
];

/// Layouts without an offset; read as UTC
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a page timestamp into a naive UTC instant.
///
/// The export writes ISO 8601 with an offset (`2011-03-14T19:27:01.000-04:00`).
/// The offset is applied and then dropped.
pub fn parse_date(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.naive_utc());
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Ok(dt.naive_utc());
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(dt);
        }
    }

    Err(Error::DateParse {
        input: text.to_string(),
        message: "no known timestamp layout matched".to_string(),
    })
}

/// Parse an `HH:MM:SS` span found anywhere in `text` (hours may have more
/// than two digits).
pub fn parse_duration(text: &str) -> Result<Duration> {
    let caps = DURATION_RE
        .captures(text)
        .ok_or_else(|| Error::DurationParse(text.to_string()))?;

    let field = |i: usize| -> Result<i64> {
        caps[i]
            .parse::<i64>()
            .map_err(|_| Error::DurationParse(text.to_string()))
    };
    let (hours, minutes, seconds) = (field(1)?, field(2)?, field(3)?);

    hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes * 60 + seconds))
        .and_then(Duration::try_seconds)
        .ok_or_else(|| Error::DurationParse(text.to_string()))
}

/// Decode numeric and named HTML entities.
///
/// Unknown or malformed references are left exactly as written.
pub fn unescape_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let raw = &caps[0];
            decode_entity(raw).unwrap_or_else(|| raw.to_string())
        })
        .into_owned()
}

fn decode_entity(raw: &str) -> Option<String> {
    let body = &raw[1..raw.len() - 1];

    if let Some(numeric) = body.strip_prefix('#') {
        let code = match numeric.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }

    let decoded = html_escape::decode_html_entities(raw);
    // A partial decode (e.g. "&ampx;" -> "&x;") is not a known entity
    if decoded == raw || decoded.contains(';') {
        None
    } else {
        Some(decoded.into_owned())
    }
}

/// Category label of a telephony container.
///
/// Returns the first tag link whose fragment is a known category token.
pub fn get_label<N: DocumentNode>(node: &N) -> Option<Label> {
    node.find_all(&TAG_LINKS).iter().find_map(|link| {
        let href = link.attribute("href")?;
        let (_, token) = href.rsplit_once('#')?;
        Label::from_token(token)
    })
}
