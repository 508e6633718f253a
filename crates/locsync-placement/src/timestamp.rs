//! Deletion timestamp validation

use chrono::DateTime;

/// Whether `ts` is an RFC 3339 date-time, e.g. `2024-05-01T12:00:00Z`
///
/// Stricter than `DateTime::parse_from_rfc3339`: the date/time separator must
/// be an uppercase `T`, a UTC offset must be an uppercase `Z`, and leap
/// seconds are rejected.
#[must_use]
pub fn valid_rfc3339(ts: &str) -> bool {
    let bytes = ts.as_bytes();
    if bytes.get(10) != Some(&b'T') || bytes.last() == Some(&b'z') {
        return false;
    }
    if bytes.get(17..19) == Some(&b"60"[..]) {
        return false;
    }
    DateTime::parse_from_rfc3339(ts).is_ok()
}
