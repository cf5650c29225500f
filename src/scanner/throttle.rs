//! Bandwidth-aware fetch throttle
//!
//! The scan is strictly sequential, so capping sustained throughput only
//! needs a delay after each response sized to the payload just downloaded.

use std::time::Duration;

/// Design default download ceiling: 12,500 bytes/sec ≈ 100 kbit/s
pub const DEFAULT_MAX_BYTES_PER_SEC: u32 = 12_500;

/// Computes inter-fetch delays from response sizes
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    max_bytes_per_sec: u32,
}

impl Throttle {
    pub fn new(max_bytes_per_sec: u32) -> Self {
        Self { max_bytes_per_sec }
    }

    /// Returns the pause owed after downloading `content_length` bytes
    ///
    /// When the response declared no length there is nothing to size the
    /// delay by; skipping the pause is preferred over blocking on a guess.
    pub fn delay_for(&self, content_length: Option<u64>) -> Duration {
        match content_length {
            Some(bytes) => Duration::from_secs_f64(bytes as f64 / self.max_bytes_per_sec as f64),
            None => Duration::ZERO,
        }
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BYTES_PER_SEC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_scales_with_length() {
        let throttle = Throttle::default();
        assert_eq!(throttle.delay_for(Some(12_500)), Duration::from_secs(1));
        assert_eq!(throttle.delay_for(Some(25_000)), Duration::from_secs(2));
    }

    #[test]
    fn test_small_response_short_delay() {
        let throttle = Throttle::default();
        let delay = throttle.delay_for(Some(1_250));
        assert_eq!(delay, Duration::from_millis(100));
    }

    #[test]
    fn test_unknown_length_skips_delay() {
        let throttle = Throttle::default();
        assert_eq!(throttle.delay_for(None), Duration::ZERO);
    }

    #[test]
    fn test_configured_ceiling() {
        let throttle = Throttle::new(50_000);
        assert_eq!(throttle.delay_for(Some(25_000)), Duration::from_millis(500));
    }
}
