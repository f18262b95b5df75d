//! Certificate lifecycle evaluation.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Days before expiration during which a certificate must be renewed.
pub const RENEWAL_WINDOW_DAYS: i64 = 30;

const DAY_MS: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Valide,
    #[serde(rename = "a_renouveler")]
    ARenouveler,
    Expire,
}

impl CertificateStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CertificateStatus::Valide => "valide",
            CertificateStatus::ARenouveler => "a_renouveler",
            CertificateStatus::Expire => "expire",
        }
    }

    fn from_days(days: i64) -> Self {
        if days < 0 {
            CertificateStatus::Expire
        } else if days <= RENEWAL_WINDOW_DAYS {
            CertificateStatus::ARenouveler
        } else {
            CertificateStatus::Valide
        }
    }
}

/// Whole days until the expiration date's UTC midnight, rounded up.
pub fn days_until(expires_on: NaiveDate, now: DateTime<Utc>) -> i64 {
    let expiry = expires_on.and_time(NaiveTime::MIN).and_utc();
    let remaining_ms = (expiry - now).num_milliseconds();
    -(-remaining_ms).div_euclid(DAY_MS)
}

pub fn evaluate_at(expires_on: NaiveDate, now: DateTime<Utc>) -> CertificateStatus {
    CertificateStatus::from_days(days_until(expires_on, now))
}

pub fn evaluate(expires_on: NaiveDate) -> CertificateStatus {
    evaluate_at(expires_on, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 10, 30, 0)
            .single()
            .expect("valid instant")
    }

    #[test]
    fn days_round_up_partial_days() {
        let today = morning().date_naive();
        assert_eq!(days_until(today + Duration::days(1), morning()), 1);
        assert_eq!(days_until(today, morning()), 0);
        assert_eq!(days_until(today - Duration::days(1), morning()), -1);
    }

    #[test]
    fn exact_midnight_is_not_rounded() {
        let midnight = Utc
            .with_ymd_and_hms(2025, 6, 10, 0, 0, 0)
            .single()
            .expect("valid instant");
        let in_thirty = NaiveDate::from_ymd_opt(2025, 7, 10).expect("valid date");
        assert_eq!(days_until(in_thirty, midnight), 30);
    }

    #[test]
    fn status_boundaries() {
        let today = morning().date_naive();
        assert_eq!(
            evaluate_at(today + Duration::days(30), morning()),
            CertificateStatus::ARenouveler
        );
        assert_eq!(
            evaluate_at(today + Duration::days(31), morning()),
            CertificateStatus::Valide
        );
        assert_eq!(evaluate_at(today, morning()), CertificateStatus::ARenouveler);
        assert_eq!(
            evaluate_at(today - Duration::days(1), morning()),
            CertificateStatus::Expire
        );
    }

    #[test]
    fn labels_match_wire_format() {
        let json = serde_json::to_string(&CertificateStatus::ARenouveler).expect("serialize");
        assert_eq!(json, "\"a_renouveler\"");
        assert_eq!(CertificateStatus::Expire.label(), "expire");
    }
}
