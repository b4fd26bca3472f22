use std::time::Duration;

/// Blocks the calling thread between retry attempts.
///
/// The client calls this once before every retry. Tests inject an
/// implementation that records the requested durations instead of sleeping.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Default [`Sleeper`] backed by [`std::thread::sleep`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Pause taken after a failed `attempt` (1-indexed) and before the next one.
pub fn backoff_delay(pause_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(pause_ms.saturating_mul(u64::from(attempt)))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::backoff_delay;

    #[test]
    fn delay_grows_linearly_with_attempt() {
        assert_eq!(backoff_delay(1_000, 1), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(1_000, 2), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(250, 4), Duration::from_millis(1_000));
    }

    #[test]
    fn zero_pause_never_sleeps() {
        assert_eq!(backoff_delay(0, 7), Duration::ZERO);
    }

    #[test]
    fn delay_saturates_instead_of_overflowing() {
        assert_eq!(backoff_delay(u64::MAX, 3), Duration::from_millis(u64::MAX));
    }
}
