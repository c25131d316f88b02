//! Field normalization for source market documents.
//!
//! Documents arrive as MongoDB relaxed Extended JSON, so a single logical
//! field can show up as a native scalar (`12.5`, `"abc"`) or as a one-key
//! box (`{"$numberDouble": "Infinity"}`, `{"$oid": "65f0..."}`). Every field
//! is first classified into a [`RawField`], then handed to exactly one
//! normalizer per field family (identifier, number, integer, timestamp,
//! text). Nothing here fails: malformed input degrades to a default or to
//! `None`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use serde_json::{Map, Value};

use crate::types::MarketRecord;

/// Box tags understood by the normalizer.
const BOX_TAGS: &[&str] = &[
    "$oid",
    "$numberDouble",
    "$numberInt",
    "$numberLong",
    "$numberDecimal",
    "$date",
];

/// Accepted timestamp layouts, tried in order. First match wins.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d",
];

/// Canonical output: microsecond fraction only when there is one.
const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const CANONICAL_FORMAT_MICROS: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// One field of a raw document, classified by encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawField<'a> {
    /// Absent or explicitly `null`.
    Missing,
    /// A native string, number or bool.
    Plain(&'a Value),
    /// A recognized `{"$tag": payload}` wrapper.
    Boxed { tag: &'a str, payload: &'a Value },
    /// Arrays and objects that are not a recognized box.
    Other(&'a Value),
}

impl<'a> RawField<'a> {
    pub fn of(doc: &'a Map<String, Value>, key: &str) -> Self {
        doc.get(key).map(Self::classify).unwrap_or(Self::Missing)
    }

    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::Null => Self::Missing,
            Value::String(_) | Value::Number(_) | Value::Bool(_) => Self::Plain(value),
            Value::Object(map) if map.len() == 1 => match map.iter().next() {
                Some((tag, payload)) if BOX_TAGS.contains(&tag.as_str()) => Self::Boxed {
                    tag: tag.as_str(),
                    payload,
                },
                _ => Self::Other(value),
            },
            _ => Self::Other(value),
        }
    }

    /// The scalar carried by the field, unboxed one level.
    fn scalar(self) -> Option<&'a Value> {
        match self {
            Self::Plain(v) => Some(v),
            Self::Boxed { payload, .. } if !payload.is_object() => Some(payload),
            _ => None,
        }
    }
}

/// Normalize one raw document into a [`MarketRecord`].
pub fn normalize(doc: &Value) -> MarketRecord {
    let empty = Map::new();
    let fields = doc.as_object().unwrap_or(&empty);
    let field = |key: &str| RawField::of(fields, key);
    let field_or = |key: &str, fallback: &str| match field(key) {
        RawField::Missing => field(fallback),
        found => found,
    };

    MarketRecord {
        id: identifier(fields),
        title: text(field("title")),
        description: text(field("description")),
        slug: text(field("slug")),
        ticker: text(field("ticker")),
        volume: number(field("volume")),
        comment_count: integer(field("commentCount")),
        image: text(field("image")),
        icon: text(field("icon")),
        resolution_source: text(field("resolutionSource")),
        published_at: text(field_or("publishedAt", "published_at")),
        updated_at: text(field("updatedAt")),
        start_date: timestamp(field("startDate")),
        end_date: timestamp(field("endDate")),
        created_at: timestamp(field_or("createdAt", "creationDate")),
        closed_time: timestamp(field("closedTime")),
        category: non_empty(text(field("category"))),
        series_slug: non_empty(text(field("seriesSlug"))),
    }
}

/// Resolve the document key: `id` first, then `_id` (unwrapping `$oid`).
/// Returns an empty string when neither yields anything.
pub fn identifier(doc: &Map<String, Value>) -> String {
    let explicit = coerce_string(RawField::of(doc, "id"));
    if !explicit.is_empty() {
        return explicit;
    }
    coerce_string(RawField::of(doc, "_id"))
}

/// Parse a numeric field, honouring the Extended JSON special literals.
/// Unparseable input becomes `0.0`.
pub fn number(field: RawField<'_>) -> f64 {
    match field.scalar() {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => parse_float_literal(s).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Parse an integer field. Fractions truncate toward zero; anything
/// non-finite or unparseable becomes `0`.
pub fn integer(field: RawField<'_>) -> i64 {
    let from_float = |f: f64| if f.is_finite() { f.trunc() as i64 } else { 0 };
    match field.scalar() {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(from_float))
            .unwrap_or(0),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| parse_float_literal(s).map(from_float))
            .unwrap_or(0),
        _ => 0,
    }
}

/// Normalize a date-like field to a canonical ISO-8601 string, or `None`
/// when it is absent or in no recognized layout.
pub fn timestamp(field: RawField<'_>) -> Option<String> {
    let parsed = match field {
        RawField::Plain(Value::String(s)) => parse_date(s),
        RawField::Boxed { tag: "$date", payload } => match payload {
            Value::String(s) => parse_date(s),
            Value::Number(n) => n.as_i64().and_then(from_epoch_millis),
            Value::Object(_) => match RawField::classify(payload) {
                RawField::Boxed { tag: "$numberLong", payload: Value::String(ms) } => {
                    ms.trim().parse().ok().and_then(from_epoch_millis)
                }
                _ => None,
            },
            _ => None,
        },
        _ => None,
    };
    parsed.map(canonical)
}

fn canonical(dt: NaiveDateTime) -> String {
    let format = if dt.nanosecond() == 0 {
        CANONICAL_FORMAT
    } else {
        CANONICAL_FORMAT_MICROS
    };
    dt.format(format).to_string()
}

/// Try each accepted layout in order.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS.iter().find_map(|fmt| {
        if fmt.contains("%H") {
            NaiveDateTime::parse_from_str(raw, fmt).ok()
        } else {
            // Date-only layout: midnight.
            NaiveDate::parse_from_str(raw, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        }
    })
}

fn from_epoch_millis(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

fn parse_float_literal(raw: &str) -> Option<f64> {
    match raw.trim() {
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        s => s.parse().ok(),
    }
}

fn text(field: RawField<'_>) -> String {
    match field.scalar() {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Like `text`, but structured values are rendered as JSON instead of dropped.
fn coerce_string(field: RawField<'_>) -> String {
    match field {
        RawField::Missing => String::new(),
        RawField::Other(v) => v.to_string(),
        RawField::Boxed { payload, .. } if payload.is_object() => payload.to_string(),
        scalar => text(scalar),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
