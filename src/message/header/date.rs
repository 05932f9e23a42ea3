use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use super::{Header, HeaderName};

/// Source of the current time for the `Date` header
pub trait Clock {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Message `Date` header
///
/// Defined in [RFC2822](https://tools.ietf.org/html/rfc2822#section-3.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date(DateTime<FixedOffset>);

impl Date {
    /// `now` expressed in the IANA zone `timezone`
    ///
    /// An empty or unknown zone falls back to UTC.
    pub fn in_zone(now: DateTime<Utc>, timezone: &str) -> Self {
        let timezone = timezone.trim();
        if timezone.is_empty() {
            return Self::fixed(now, &Utc);
        }

        match timezone.parse::<Tz>() {
            Ok(tz) => Self::fixed(now, &tz),
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(timezone, "unknown timezone, using UTC: {_err}");
                Self::fixed(now, &Utc)
            }
        }
    }

    fn fixed<Z: TimeZone>(now: DateTime<Utc>, zone: &Z) -> Self {
        let local = now.with_timezone(zone);
        let offset = local.offset().fix();
        Self(local.with_timezone(&offset))
    }
}

impl Header for Date {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_static("Date")
    }

    fn display(&self) -> String {
        self.0.to_rfc2822()
    }
}
