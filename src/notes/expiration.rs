//! Expiration modes.
//!
//! Callers choose a note's lifetime with a small integer. Unknown values
//! mean "no time-based expiry", the same as mode 0.

use chrono::{DateTime, Duration, Utc};

/// The lifetime bucket selected by an expiration mode integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpirationMode {
    /// No expiry time; the note is deleted by its first read
    Never,
    FiveMinutes,
    TwentyMinutes,
    OneHour,
    FourHours,
    OneDay,
}

impl ExpirationMode {
    /// Maps a caller-supplied mode to a bucket.
    pub fn from_mode(mode: i64) -> Self {
        match mode {
            1 => ExpirationMode::FiveMinutes,
            2 => ExpirationMode::TwentyMinutes,
            3 => ExpirationMode::OneHour,
            4 => ExpirationMode::FourHours,
            5 => ExpirationMode::OneDay,
            _ => ExpirationMode::Never,
        }
    }

    /// The integer a client would send for this bucket.
    pub fn code(self) -> i64 {
        match self {
            ExpirationMode::Never => 0,
            ExpirationMode::FiveMinutes => 1,
            ExpirationMode::TwentyMinutes => 2,
            ExpirationMode::OneHour => 3,
            ExpirationMode::FourHours => 4,
            ExpirationMode::OneDay => 5,
        }
    }

    pub fn lifetime(self) -> Option<Duration> {
        match self {
            ExpirationMode::Never => None,
            ExpirationMode::FiveMinutes => Some(Duration::minutes(5)),
            ExpirationMode::TwentyMinutes => Some(Duration::minutes(20)),
            ExpirationMode::OneHour => Some(Duration::hours(1)),
            ExpirationMode::FourHours => Some(Duration::hours(4)),
            ExpirationMode::OneDay => Some(Duration::hours(24)),
        }
    }

    /// The expiry time of a note created at `created_at`.
    pub fn expires_at(self, created_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.lifetime().map(|lifetime| created_at + lifetime)
    }
}
