//! Cached HTTP `date` header value.
//!
//! Formatting a date for every response is wasteful when many responses
//! finish within the same second, so the formatted value is kept until the
//! wall clock moves on to the next second. Readers may see a value that is
//! up to one second old.

use parking_lot::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

static UTC_CACHE: Mutex<Option<(u64, String)>> = parking_lot::const_mutex(None);

/// Current time in IMF-fixdate form, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn utc_date() -> String {
    let now = SystemTime::now();
    let second = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let mut cache = UTC_CACHE.lock();
    match cache.as_ref() {
        Some((cached_second, value)) if *cached_second == second => value.clone(),
        _ => {
            let value = httpdate::fmt_http_date(now);
            *cache = Some((second, value.clone()));
            value
        }
    }
}
