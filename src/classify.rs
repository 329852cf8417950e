//! Maps raw API answers to success or a typed [`CensusError`].
//!
//! The Census API reports failures as a short free-text sentence, so the
//! sub-kind is picked by pattern matching on that text. Anything that does not
//! match lands in [`CensusError::Api`]. The body is always kept verbatim.

use crate::error::{CensusError, Result};
use crate::transport::RawResponse;
use regex::Regex;
use std::sync::LazyLock;

static AUTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)invalid\s+key|key\s+(is\s+)?(not\s+valid|invalid|expired|not\s+activated)|valid\s+(<[^>]+>\s*)?key(\s*</[^>]+>)?\s+must\s+be|missing\s+key",
    )
    .expect("static regex")
});

static UNKNOWN_VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)unknown\s+variable|unknown\s+predicate|invalid\s+variable|variable\s+.*not\s+(found|supported)")
        .expect("static regex")
});

// The API spells it "heirarchy".
static UNSUPPORTED_GEOGRAPHY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(unknown|unsupported|invalid|ambiguous)[/\s]+(unsupported\s+)?geograph|hi?ei?rarchy|invalid\s+'?(for|in)'?\s+(argument|clause)",
    )
    .expect("static regex")
});

/// Pass a successful response through, or turn it into the matching error.
///
/// ### Errors
/// One of [`CensusError::Authentication`], [`CensusError::UnknownVariable`],
/// [`CensusError::UnsupportedGeography`] or [`CensusError::Api`], each
/// carrying the response body unchanged.
pub fn classify(raw: RawResponse) -> Result<RawResponse> {
    if raw.status == 200 {
        // Bad keys are sometimes answered with a 200 HTML page.
        let looks_json = raw.body.trim_start().starts_with(['[', '{']);
        if !looks_json && AUTH.is_match(&raw.body) {
            return Err(CensusError::Authentication { detail: raw.body });
        }
        return Ok(raw);
    }

    log::debug!("HTTP {} from {}: {}", raw.status, raw.url, raw.body.trim());
    let detail = raw.body;
    if matches!(raw.status, 401 | 403) || AUTH.is_match(&detail) {
        return Err(CensusError::Authentication { detail });
    }
    if UNKNOWN_VARIABLE.is_match(&detail) {
        return Err(CensusError::UnknownVariable { detail });
    }
    if UNSUPPORTED_GEOGRAPHY.is_match(&detail) {
        return Err(CensusError::UnsupportedGeography { detail });
    }
    Err(CensusError::Api {
        status: raw.status,
        detail,
    })
}
