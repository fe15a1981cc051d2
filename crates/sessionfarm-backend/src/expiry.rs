//! Session expiry threshold.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Raw configuration value meaning "sessions never expire".
pub const NEVER_EXPIRE_MILLIS: i64 = -1;

/// How long a session may go untouched before it is expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryThreshold {
    /// Expiry scans return nothing and never touch the backend.
    #[default]
    Never,
    /// Sessions idle for longer than this are expired.
    After(Duration),
}

impl ExpiryThreshold {
    /// Interpret a configured millisecond value; `-1` means never.
    pub fn from_millis(millis: i64) -> Result<Self> {
        match millis {
            NEVER_EXPIRE_MILLIS => Ok(Self::Never),
            m if m < 0 => Err(Error::Configuration(format!(
                "expiry threshold must be {NEVER_EXPIRE_MILLIS} (never) or non-negative, got {m}"
            ))),
            m => Ok(Self::After(Duration::from_millis(m.unsigned_abs()))),
        }
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Self::Never)
    }

    /// Epoch millisecond cutoff: index entries strictly below it are expired.
    pub fn cutoff_millis(&self, now_millis: i64) -> Option<i64> {
        match self {
            Self::Never => None,
            Self::After(d) => {
                let d = i64::try_from(d.as_millis()).unwrap_or(i64::MAX);
                Some(now_millis.saturating_sub(d))
            }
        }
    }

    /// Wall-clock cutoff for comparing local last-accessed timestamps.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cutoff_millis(now.timestamp_millis())
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }
}
