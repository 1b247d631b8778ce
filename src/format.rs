// Time formatting helpers for the progress line and timer notification
use std::time::Duration;

use crate::error::{PlayerError, Result};

/// Format elapsed milliseconds as zero-padded `MM:SS`.
///
/// Minutes are not capped, so a two hour track shows `120:00`.
pub fn format_elapsed(milliseconds: u64) -> String {
    let total_seconds = milliseconds / 1000;
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}", minutes, seconds)
}

pub fn format_duration(duration: Duration) -> String {
    format_elapsed(duration.as_millis().min(u64::MAX as u128) as u64)
}

/// Format whole minutes left on the sleep timer, e.g. `1h 05m` or `15m`
pub fn format_remaining(minutes: u64) -> String {
    if minutes >= 60 {
        format!("{}h {:02}m", minutes / 60, minutes % 60)
    } else {
        format!("{}m", minutes)
    }
}

/// Parse a seek position typed by the user.
///
/// Accepts `SS`, `MM:SS` and `HH:MM:SS`. Every field after the first must be below 60.
pub fn parse_position(input: &str) -> Result<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PlayerError::InvalidPosition("empty position".to_string()));
    }

    let fields = input
        .split(':')
        .map(|part| {
            part.trim()
                .parse::<u64>()
                .map_err(|_| PlayerError::InvalidPosition(input.to_string()))
        })
        .collect::<Result<Vec<u64>>>()?;

    if fields.len() > 3 {
        return Err(PlayerError::InvalidPosition(input.to_string()));
    }
    if fields.iter().skip(1).any(|&f| f >= 60) {
        return Err(PlayerError::InvalidPosition(input.to_string()));
    }

    let seconds = fields
        .iter()
        .try_fold(0u64, |acc, &f| acc.checked_mul(60)?.checked_add(f))
        .ok_or_else(|| PlayerError::InvalidPosition(format!("{} is out of range", input)))?;
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_format_elapsed_zero() {
        assert_eq!(format_elapsed(0), "00:00");
    }

    #[test]
    fn test_format_elapsed_truncates_millis() {
        assert_eq!(format_elapsed(999), "00:00");
        assert_eq!(format_elapsed(1_000), "00:01");
        assert_eq!(format_elapsed(59_999), "00:59");
    }

    #[test]
    fn test_format_elapsed_minutes() {
        assert_eq!(format_elapsed(60_000), "01:00");
        assert_eq!(format_elapsed(185_000), "03:05");
        assert_eq!(format_elapsed(7_500_000), "125:00");
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(0), "0m");
        assert_eq!(format_remaining(15), "15m");
        assert_eq!(format_remaining(60), "1h 00m");
        assert_eq!(format_remaining(95), "1h 35m");
    }

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position("42").unwrap(), Duration::from_secs(42));
        assert_eq!(parse_position("1:30").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_position(" 1:02:03 ").unwrap(), Duration::from_secs(3723));
    }

    #[test]
    fn test_parse_position_rejects_garbage() {
        assert!(parse_position("").is_err());
        assert!(parse_position("abc").is_err());
        assert!(parse_position("1:75").is_err());
        assert!(parse_position("1:2:3:4").is_err());
        assert!(parse_position("-5").is_err());
        assert!(parse_position("307445734561825861:00").is_err());
        assert!(parse_position("99999999999999999:59:59").is_err());
    }

    proptest! {
        #[test]
        fn prop_format_elapsed_is_padded(ms in any::<u64>()) {
            let text = format_elapsed(ms);
            let (minutes, seconds) = text.split_once(':').unwrap();

            prop_assert!(minutes.len() >= 2);
            prop_assert_eq!(seconds.len(), 2);
            let minutes: u64 = minutes.parse().unwrap();
            let seconds: u64 = seconds.parse().unwrap();
            prop_assert!(seconds < 60);
            prop_assert_eq!(minutes * 60 + seconds, ms / 1000);
        }
    }
}
