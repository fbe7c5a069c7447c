use chrono::Utc;

/// Milliseconds since the Unix epoch, the timestamp unit stored in quiz records.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Whole seconds elapsed between `since` and `now`, both in epoch millis.
/// A `since` in the future counts as zero.
pub fn elapsed_secs(since: i64, now: i64) -> u32 {
    let millis = now.saturating_sub(since).max(0);
    u32::try_from(millis / 1000).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_rounds_down_and_never_goes_negative() {
        assert_eq!(elapsed_secs(1_000, 3_999), 2);
        assert_eq!(elapsed_secs(5_000, 1_000), 0);
    }

    #[test]
    fn now_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }
}
