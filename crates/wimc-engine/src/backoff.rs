use std::time::Duration;

/// Delay before the next retry cycle: `base * 2^cycle`, saturating, capped
/// at `ceiling`.
///
/// `cycle` is 0-indexed; the first backoff sleeps `base`.
pub fn backoff_delay(cycle: u32, base: Duration, ceiling: Duration) -> Duration {
    let multiplier = 2_u32.saturating_pow(cycle);
    base.saturating_mul(multiplier).min(ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_per_cycle() {
        let base = Duration::from_millis(100);
        let ceiling = Duration::from_secs(60);
        assert_eq!(backoff_delay(0, base, ceiling), Duration::from_millis(100));
        assert_eq!(backoff_delay(1, base, ceiling), Duration::from_millis(200));
        assert_eq!(backoff_delay(2, base, ceiling), Duration::from_millis(400));
        assert_eq!(backoff_delay(3, base, ceiling), Duration::from_millis(800));
    }

    #[test]
    fn saturates_at_ceiling() {
        let base = Duration::from_millis(500);
        let ceiling = Duration::from_secs(2);
        assert_eq!(backoff_delay(1, base, ceiling), Duration::from_secs(1));
        assert_eq!(backoff_delay(2, base, ceiling), Duration::from_secs(2));
        assert_eq!(backoff_delay(10, base, ceiling), Duration::from_secs(2));
        assert_eq!(backoff_delay(u32::MAX, base, ceiling), Duration::from_secs(2));
    }
}
