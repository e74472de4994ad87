//! Ledger-native time: whole seconds since 2000-01-01T00:00:00Z.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EscrowError, Result};

/// Unix timestamp of the ledger epoch.
pub const LEDGER_EPOCH_OFFSET: u64 = 946_684_800;

/// A point in time as the ledger encodes `FinishAfter` and `CancelAfter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerTime(u32);

impl LedgerTime {
    pub const fn from_secs(secs: u32) -> Self {
        Self(secs)
    }

    pub const fn as_secs(self) -> u32 {
        self.0
    }

    /// Current wall-clock time, rounded down to the second.
    pub fn now() -> Result<Self> {
        Self::from_system_time(SystemTime::now())
    }

    /// Wall-clock time `delay` from now.
    pub fn after(delay: Duration) -> Result<Self> {
        let at = SystemTime::now()
            .checked_add(delay)
            .ok_or(EscrowError::TimeOutOfRange)?;
        Self::from_system_time(at)
    }

    pub fn from_system_time(time: SystemTime) -> Result<Self> {
        let unix = time
            .duration_since(UNIX_EPOCH)
            .map_err(|_| EscrowError::TimeOutOfRange)?
            .as_secs();
        Self::from_unix(unix)
    }

    pub fn to_system_time(self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.to_unix())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Result<Self> {
        let unix = u64::try_from(dt.timestamp()).map_err(|_| EscrowError::TimeOutOfRange)?;
        Self::from_unix(unix)
    }

    pub fn to_datetime(self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.to_system_time())
    }

    pub fn to_unix(self) -> u64 {
        u64::from(self.0) + LEDGER_EPOCH_OFFSET
    }

    fn from_unix(unix: u64) -> Result<Self> {
        let secs = unix
            .checked_sub(LEDGER_EPOCH_OFFSET)
            .ok_or(EscrowError::TimeOutOfRange)?;
        u32::try_from(secs)
            .map(Self)
            .map_err(|_| EscrowError::TimeOutOfRange)
    }

    pub fn checked_add(self, secs: u32) -> Option<Self> {
        self.0.checked_add(secs).map(Self)
    }

    /// Time left from `now` until the clock reads strictly later than
    /// `self`, i.e. the start of the following second; zero once past.
    pub fn until_past(self, now: SystemTime) -> Duration {
        (self.to_system_time() + Duration::from_secs(1))
            .duration_since(now)
            .unwrap_or(Duration::ZERO)
    }

    /// Whether `now` falls strictly after `self` at ledger resolution.
    pub fn is_past(self, now: SystemTime) -> bool {
        self.until_past(now).is_zero()
    }
}

impl fmt::Display for LedgerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.to_datetime().to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn epoch_conversions() {
        let epoch = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(LedgerTime::from_datetime(epoch).unwrap().as_secs(), 0);

        let t = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 15).unwrap();
        let lt = LedgerTime::from_datetime(t).unwrap();
        assert_eq!(lt.to_unix() as i64, t.timestamp());
        assert_eq!(lt.to_datetime(), t);
        assert_eq!(LedgerTime::from_system_time(lt.to_system_time()).unwrap(), lt);
    }

    #[test]
    fn out_of_range() {
        let before = Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(
            LedgerTime::from_datetime(before),
            Err(EscrowError::TimeOutOfRange)
        );
        let far = UNIX_EPOCH + Duration::from_secs(LEDGER_EPOCH_OFFSET + u64::from(u32::MAX) + 1);
        assert_eq!(
            LedgerTime::from_system_time(far),
            Err(EscrowError::TimeOutOfRange)
        );
        assert_eq!(LedgerTime::from_secs(u32::MAX).checked_add(1), None);
    }

    #[test]
    fn after_is_in_the_future() {
        let now = LedgerTime::now().unwrap();
        let later = LedgerTime::after(Duration::from_secs(15)).unwrap();
        assert!(later.as_secs() >= now.as_secs() + 14);
        assert!(later.until_past(SystemTime::now()) <= Duration::from_secs(16));
        assert!(!later.is_past(SystemTime::now()));
    }

    #[test]
    fn past_means_the_following_second() {
        let gate = LedgerTime::from_secs(800_000_000);
        let at = gate.to_system_time();
        assert_eq!(gate.until_past(at), Duration::from_secs(1));
        assert!(!gate.is_past(at + Duration::from_millis(999)));
        assert!(gate.is_past(at + Duration::from_secs(1)));
        assert_eq!(
            LedgerTime::from_system_time(at + Duration::from_secs(1)).unwrap(),
            gate.checked_add(1).unwrap()
        );
    }

    #[test]
    fn serializes_as_integer() {
        let json = serde_json::to_string(&LedgerTime::from_secs(772_000_000)).unwrap();
        assert_eq!(json, "772000000");
    }
}
