use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// The error returned when a duration value cannot be parsed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid duration {0}, expected a number followed by ms, s, m or h")]
pub struct ParseDurationError(pub String);

/// Parse a duration value such as `500ms`, `10s`, `5m` or `1h`.
///
/// A bare number is interpreted as seconds.
pub fn parse_duration(value: &str) -> Result<Duration, ParseDurationError> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (amount, unit) = value.split_at(split);
    let amount =
        u64::from_str(amount).map_err(|_| ParseDurationError(value.to_string()))?;

    match unit {
        "ms" => Ok(Duration::from_millis(amount)),
        "" | "s" => Ok(Duration::from_secs(amount)),
        "m" => amount
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| ParseDurationError(value.to_string())),
        "h" => amount
            .checked_mul(3600)
            .map(Duration::from_secs)
            .ok_or_else(|| ParseDurationError(value.to_string())),
        _ => Err(ParseDurationError(value.to_string())),
    }
}

/// Parse a duration value like [parse_duration], rejecting a zero duration.
pub fn parse_positive_duration(value: &str) -> Result<Duration, ParseDurationError> {
    let duration = parse_duration(value)?;
    if duration.is_zero() {
        return Err(ParseDurationError(value.trim().to_string()));
    }

    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(Ok(Duration::from_millis(500)), parse_duration("500ms"));
        assert_eq!(Ok(Duration::from_secs(10)), parse_duration("10s"));
        assert_eq!(Ok(Duration::from_secs(300)), parse_duration("5m"));
        assert_eq!(Ok(Duration::from_secs(7200)), parse_duration("2h"));
        assert_eq!(Ok(Duration::from_secs(300)), parse_duration("300"));
        assert_eq!(Ok(Duration::ZERO), parse_duration("0"));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert_eq!(
            Err(ParseDurationError("10d".to_string())),
            parse_duration("10d")
        );
        assert_eq!(Err(ParseDurationError("s".to_string())), parse_duration("s"));
        assert_eq!(
            Err(ParseDurationError("-1s".to_string())),
            parse_duration("-1s")
        );
    }

    #[test]
    fn test_parse_positive_duration() {
        assert_eq!(
            Ok(Duration::from_millis(250)),
            parse_positive_duration("250ms")
        );
        assert_eq!(
            Err(ParseDurationError("0".to_string())),
            parse_positive_duration("0")
        );
        assert_eq!(
            Err(ParseDurationError("0ms".to_string())),
            parse_positive_duration(" 0ms ")
        );
    }
}
