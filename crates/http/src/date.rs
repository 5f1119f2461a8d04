//! Cached value for the `Date` response header.
//!
//! Formatting an HTTP date on every response is wasteful, the value only changes once
//! per second. The cache is refreshed lazily by whichever encoder notices that it is
//! older than [`REFRESH_INTERVAL`], so it works without a background task or a runtime.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use bytes::Bytes;
use http::HeaderValue;
use once_cell::sync::Lazy;

const REFRESH_INTERVAL: Duration = Duration::from_millis(500);

/// Holds the formatted date and the time it was formatted at.
#[derive(Debug)]
pub struct DateService {
    current: ArcSwap<HeaderValue>,
    origin: Instant,
    updated_at: AtomicU64,
}

static DATE_SERVICE: Lazy<DateService> = Lazy::new(DateService::new);

impl DateService {
    /// Returns the process wide instance used by the response encoder.
    pub fn global() -> &'static DateService {
        &DATE_SERVICE
    }

    fn new() -> Self {
        Self { current: ArcSwap::from_pointee(format_now()), origin: Instant::now(), updated_at: AtomicU64::new(0) }
    }

    /// The current date as a header value, at most [`REFRESH_INTERVAL`] stale.
    pub fn http_date(&self) -> HeaderValue {
        let elapsed = duration_millis(self.origin.elapsed());
        let updated_at = self.updated_at.load(Ordering::Relaxed);

        if elapsed.saturating_sub(updated_at) >= duration_millis(REFRESH_INTERVAL)
            && self.updated_at.compare_exchange(updated_at, elapsed, Ordering::Relaxed, Ordering::Relaxed).is_ok()
        {
            self.current.store(Arc::new(format_now()));
        }

        self.current.load().as_ref().clone()
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn format_now() -> HeaderValue {
    let mut buf = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut buf);
    // faf_http_date only writes visible ascii
    HeaderValue::from_maybe_shared(Bytes::from_owner(buf)).unwrap_or_else(|_| HeaderValue::from_static("Thu, 01 Jan 1970 00:00:00 GMT"))
}
