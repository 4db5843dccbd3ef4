use std::thread;
use std::time::Duration;

/// Settle delay after an input primitive.
pub fn sleep_ms(ms: u64) {
    thread::sleep(Duration::from_millis(ms));
}

/// Inter-step pause. Non-positive or non-finite values do nothing.
pub fn sleep_secs(secs: f64) {
    if secs.is_finite() && secs > 0.0 {
        thread::sleep(Duration::from_secs_f64(secs));
    }
}
