//! Certificate status classification.
//!
//! A certificate's status is a pure function of its expiration date, the
//! calendar date it is evaluated on and the "expiring soon" lookahead window.
//! Only calendar dates are compared; the time-of-day part of the expiration
//! timestamp is dropped (UTC) before comparing.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Default lookahead window, in days, for [`CertStatus::ExpiringSoon`].
pub const DEFAULT_EXPIRING_SOON_DAYS: u32 = 30;

/// Certificate status, stored alongside each certificate as a derived field.
///
/// # Examples
///
/// ```
/// use certmon_common::status::CertStatus;
///
/// let status: CertStatus = "EXPIRING_SOON".parse().unwrap();
/// assert_eq!(status, CertStatus::ExpiringSoon);
/// assert_eq!(status.as_str(), "ExpiringSoon");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
pub enum CertStatus {
    /// 正常
    Normal,
    /// 即将过期
    ExpiringSoon,
    /// 已过期
    Expired,
}

impl CertStatus {
    pub const ALL: [CertStatus; 3] = [
        CertStatus::Normal,
        CertStatus::ExpiringSoon,
        CertStatus::Expired,
    ];

    /// Code persisted in the `status` column and used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            CertStatus::Normal => "Normal",
            CertStatus::ExpiringSoon => "ExpiringSoon",
            CertStatus::Expired => "Expired",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CertStatus::Normal => "Normal",
            CertStatus::ExpiringSoon => "Expiring soon",
            CertStatus::Expired => "Expired",
        }
    }
}

impl std::fmt::Display for CertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CertStatus {
    type Err = String;

    /// Accepts both the stored code (`ExpiringSoon`) and the constant-style
    /// name (`EXPIRING_SOON`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "normal" => Ok(CertStatus::Normal),
            "expiringsoon" => Ok(CertStatus::ExpiringSoon),
            "expired" => Ok(CertStatus::Expired),
            _ => Err(format!("unknown certificate status: {s}")),
        }
    }
}

/// Classifies a certificate as of the calendar date `as_of`.
///
/// - no expiration: `Normal` (never expires)
/// - `as_of` strictly after the expiration date: `Expired`
/// - `as_of` on or after `expiration date - threshold_days`: `ExpiringSoon`
/// - otherwise `Normal`
///
/// # Examples
///
/// ```
/// use certmon_common::status::{classify, CertStatus};
/// use chrono::{NaiveDate, TimeZone, Utc};
///
/// let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
/// let expires = Utc.with_ymd_and_hms(2026, 3, 6, 23, 59, 59).unwrap();
/// assert_eq!(classify(Some(expires), today, 30), CertStatus::ExpiringSoon);
/// assert_eq!(classify(Some(expires), today, 3), CertStatus::Normal);
/// assert_eq!(classify(None, today, 30), CertStatus::Normal);
/// ```
pub fn classify(
    expiration: Option<DateTime<Utc>>,
    as_of: NaiveDate,
    threshold_days: u32,
) -> CertStatus {
    let Some(expiration) = expiration else {
        return CertStatus::Normal;
    };
    let expiry_date = expiration.date_naive();

    if as_of > expiry_date {
        return CertStatus::Expired;
    }

    // A window reaching before the minimum representable date covers every day.
    match expiry_date.checked_sub_days(Days::new(u64::from(threshold_days))) {
        Some(warn_date) if as_of < warn_date => CertStatus::Normal,
        _ => CertStatus::ExpiringSoon,
    }
}

/// Whole calendar days from `as_of` until the expiration date. Negative once
/// the certificate has expired; `None` when there is no expiration.
pub fn days_until(expiration: Option<DateTime<Utc>>, as_of: NaiveDate) -> Option<i64> {
    expiration.map(|e| (e.date_naive() - as_of).num_days())
}
