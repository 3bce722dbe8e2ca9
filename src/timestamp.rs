//! ISO 8601 UTC timestamps without a date-time dependency.
//!
//! Format: `2024-01-15T10:30:00.123Z` (always 24 bytes).

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const LEN: usize = 24;

/// Stack-allocated ISO 8601 timestamp with millisecond precision.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Iso8601Timestamp {
    buf: [u8; LEN],
}

impl Iso8601Timestamp {
    /// Current wall-clock time.
    #[inline]
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Times before the epoch are clamped to the epoch.
    pub fn from_system_time(time: SystemTime) -> Self {
        Self::from_unix(time.duration_since(UNIX_EPOCH).unwrap_or_default())
    }

    pub fn from_unix(since_epoch: Duration) -> Self {
        let secs = since_epoch.as_secs();
        let (year, month, day) = civil_from_days((secs / 86_400) as i64);
        let day_secs = secs % 86_400;

        let mut buf = [0u8; LEN];
        put_digits(&mut buf[0..4], year as u32);
        buf[4] = b'-';
        put_digits(&mut buf[5..7], month);
        buf[7] = b'-';
        put_digits(&mut buf[8..10], day);
        buf[10] = b'T';
        put_digits(&mut buf[11..13], (day_secs / 3600) as u32);
        buf[13] = b':';
        put_digits(&mut buf[14..16], ((day_secs % 3600) / 60) as u32);
        buf[16] = b':';
        put_digits(&mut buf[17..19], (day_secs % 60) as u32);
        buf[19] = b'.';
        put_digits(&mut buf[20..23], since_epoch.subsec_millis());
        buf[23] = b'Z';

        Self { buf }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        // Only ASCII digits and separators are ever written.
        std::str::from_utf8(&self.buf).unwrap_or("1970-01-01T00:00:00.000Z")
    }
}

impl AsRef<str> for Iso8601Timestamp {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Iso8601Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Iso8601Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Days since 1970-01-01 to (year, month, day), proleptic Gregorian.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

/// Write `value` zero-padded to exactly `out.len()` digits.
fn put_digits(out: &mut [u8], mut value: u32) {
    for slot in out.iter_mut().rev() {
        *slot = b'0' + (value % 10) as u8;
        value /= 10;
    }
}
