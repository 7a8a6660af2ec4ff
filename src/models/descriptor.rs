//! Preflight descriptor and discovery endpoint references.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// HTTP verb advertised for an endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Read-only discovery.
    Get,
    /// Mutating lifecycle call.
    #[default]
    Post,
    /// Idempotent replace.
    Put,
    /// Removal.
    Delete,
}

/// Reference to a read-only discovery endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DescribingEndpointReference {
    /// HTTP verb, always `GET` for discovery.
    pub method: HttpMethod,
    /// Request path.
    pub path: String,
}

/// Reference to a mutating lifecycle endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MutatingEndpointReference {
    /// HTTP verb; defaults to `POST` when omitted.
    #[serde(default)]
    pub method: HttpMethod,
    /// Request path; an empty path is replaced by the registry default.
    #[serde(default)]
    pub path: String,
}

/// Status endpoint reference with the orchestrator's poll interval.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MutatingEndpointReferenceWithCallInterval {
    /// HTTP verb; defaults to `POST` when omitted.
    #[serde(default)]
    pub method: HttpMethod,
    /// Request path; an empty path is replaced by the registry default.
    #[serde(default)]
    pub path: String,
    /// Poll interval as a duration string such as `"5s"` or `"1500ms"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_interval: Option<String>,
}

/// Describes a preflight check to the orchestrator.
///
/// Plugins return a partially filled description from
/// [`Preflight::describe`](crate::preflight::Preflight::describe); the
/// registry fills in default paths, verbs, and the poll interval once at
/// registration and the result is immutable afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PreflightDescription {
    /// Globally unique check identifier.
    pub id: String,
    /// Human-readable label.
    pub label: String,
    /// Longer description of what the check verifies.
    pub description: String,
    /// Check version.
    pub version: String,
    /// Optional icon (URL or data URI).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Optional target attribute filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_attributes: Option<Vec<String>>,
    /// Start endpoint.
    #[serde(default)]
    pub start: MutatingEndpointReference,
    /// Status endpoint with poll interval.
    #[serde(default)]
    pub status: MutatingEndpointReferenceWithCallInterval,
    /// Cancel endpoint, present only for cancellable checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel: Option<MutatingEndpointReference>,
}

/// Discovery listing of all registered checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreflightList {
    /// One describing endpoint per registered check.
    pub preflights: Vec<DescribingEndpointReference>,
}

/// Nanoseconds per accepted duration unit.
const INTERVAL_UNITS: [(&str, u64); 8] = [
    ("ns", 1),
    ("us", 1_000),
    ("\u{b5}s", 1_000),
    ("\u{3bc}s", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60_000_000_000),
    ("h", 3_600_000_000_000),
];

/// Parse a duration string such as `"500ms"`, `"5s"`, `"1.5s"`, or `"1m30s"`.
///
/// Accepts a sequence of decimal numbers, each with an optional fraction and
/// a unit (`ns`, `us`, `ms`, `s`, `m`, `h`), plus a bare `"0"`. Fractions
/// finer than a nanosecond are truncated.
///
/// # Errors
///
/// Returns `AppError::Config` for a missing or unknown unit, a negative
/// duration, or a value that does not fit in a `u64` of nanoseconds.
pub fn parse_interval(raw: &str) -> Result<Duration> {
    let trimmed = raw.trim();
    let invalid = |why: &str| AppError::Config(format!("invalid interval '{trimmed}': {why}"));

    let mut rest = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid("empty"));
    }
    if rest.starts_with('-') {
        return Err(invalid("negative durations are not allowed"));
    }

    let mut total: u64 = 0;
    while !rest.is_empty() {
        let (whole, after) = split_digits(rest);
        let (fraction, after) = match after.strip_prefix('.') {
            Some(after) => split_digits(after),
            None => ("", after),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("expected a number"));
        }

        let unit_len = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, after) = after.split_at(unit_len);
        let scale = INTERVAL_UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, scale)| *scale)
            .ok_or_else(|| {
                if unit.is_empty() {
                    invalid("missing unit")
                } else {
                    invalid(&format!("unknown unit '{unit}'"))
                }
            })?;

        total = component_nanos(whole, fraction, scale)
            .and_then(|nanos| total.checked_add(nanos))
            .ok_or_else(|| invalid("out of range"))?;
        rest = after;
    }

    Ok(Duration::from_nanos(total))
}

fn split_digits(raw: &str) -> (&str, &str) {
    let len = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    raw.split_at(len)
}

/// One `<whole>.<fraction><unit>` component in nanoseconds, `None` on overflow.
fn component_nanos(whole: &str, fraction: &str, scale: u64) -> Option<u64> {
    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(scale)?;
    let mut place = scale;
    for digit in fraction.bytes() {
        place /= 10;
        if place == 0 {
            break;
        }
        nanos = nanos.checked_add(u64::from(digit - b'0') * place)?;
    }
    Some(nanos)
}

/// Render a duration in the shortest exact form accepted by [`parse_interval`].
#[must_use]
pub fn format_interval(interval: Duration) -> String {
    let nanos = interval.as_nanos();
    if nanos % 1_000_000_000 == 0 {
        format!("{}s", nanos / 1_000_000_000)
    } else if nanos % 1_000_000 == 0 {
        format!("{}ms", nanos / 1_000_000)
    } else {
        format!("{nanos}ns")
    }
}
