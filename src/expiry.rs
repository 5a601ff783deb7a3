//! Expiry classification for compliance documents.
//!
//! Every view classifies through here so the 30-day window and the handling of
//! absent or malformed dates are the same everywhere.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{FleetError, Result};

/// Days ahead of today during which a document counts as expiring.
pub const EXPIRY_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Missing,
    Expired,
    Expiring,
    Valid,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 4] = [
        DocumentStatus::Missing,
        DocumentStatus::Expired,
        DocumentStatus::Expiring,
        DocumentStatus::Valid,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Expired => "expired",
            Self::Expiring => "expiring",
            Self::Valid => "valid",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for DocumentStatus {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_lowercase();
        DocumentStatus::ALL
            .iter()
            .find(|st| st.key() == needle)
            .copied()
            .ok_or_else(|| FleetError::UnknownStatus(s.to_string()))
    }
}

/// Parse an expiry date as stored by the backend: a plain date, an RFC 3339
/// timestamp, or a space-separated datetime. Anything else is `None`.
pub fn parse_expiry(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.date())
}

pub fn classify_date(expiry: Option<NaiveDate>, today: NaiveDate) -> DocumentStatus {
    let Some(expiry) = expiry else {
        return DocumentStatus::Missing;
    };
    if expiry < today {
        DocumentStatus::Expired
    } else if expiry <= today + Duration::days(EXPIRY_WINDOW_DAYS) {
        DocumentStatus::Expiring
    } else {
        DocumentStatus::Valid
    }
}

/// Unparseable dates classify as `Missing`, same as absent ones.
pub fn classify(expiry: Option<&str>, today: NaiveDate) -> DocumentStatus {
    classify_date(expiry.and_then(parse_expiry), today)
}

pub fn days_until(expiry: Option<&str>, today: NaiveDate) -> Option<i64> {
    expiry
        .and_then(parse_expiry)
        .map(|d| (d - today).num_days())
}

pub fn display_date(raw: Option<&str>) -> String {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => "\u{2014}".to_string(),
        Some(s) => match parse_expiry(s) {
            Some(d) => d.format("%d %b %Y").to_string(),
            None => "Invalid Date".to_string(),
        },
    }
}
