use std::time::Duration;

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

/// Human-readable run time, e.g. "2 minutes and 5 seconds".
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    if total == 0 {
        return "less than one second".to_string();
    }
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours == 0 && minutes == 0 {
        plural(seconds, "second")
    } else if hours == 0 {
        format!("{} and {}", plural(minutes, "minute"), plural(seconds, "second"))
    } else {
        format!(
            "{}, {} and {}",
            plural(hours, "hour"),
            plural(minutes, "minute"),
            plural(seconds, "second")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(400)), "less than one second");
        assert_eq!(format_elapsed(Duration::from_secs(1)), "1 second");
        assert_eq!(format_elapsed(Duration::from_secs(42)), "42 seconds");
        assert_eq!(format_elapsed(Duration::from_secs(61)), "1 minute and 1 second");
        assert_eq!(
            format_elapsed(Duration::from_secs(2 * 3600 + 5)),
            "2 hours, 0 minutes and 5 seconds"
        );
    }
}
