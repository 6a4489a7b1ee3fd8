//! Validation shared by the configurable stages

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Window length must be a positive number of seconds, got: {0}")]
    Window(f64),
    #[error("Target cadence must be a positive number of seconds, got: {0}")]
    Cadence(f64),
    #[error("Trim range start {start} lies after its end {end}")]
    Range { start: f64, end: f64 },
}

pub(crate) fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SecondsError {
    #[error("Expected a duration, got nothing")]
    Empty,
    #[error("Not a number of seconds or a duration such as `1.5 min`: {0}")]
    Malformed(crate::units::Error),
    #[error("Duration must be positive and finite, got: {0} s")]
    NotPositive(f64),
}

/// Parses a plain number of seconds or a duration with units, `60` and
/// `1 min` give the same result.
pub fn parse_seconds(text: &str) -> Result<f64, SecondsError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SecondsError::Empty);
    }
    let seconds = match text.parse::<f64>() {
        Ok(seconds) => seconds,
        Err(_) => text
            .parse::<crate::units::Datum>()
            .map_err(SecondsError::Malformed)?
            .seconds(),
    };
    if positive(seconds) {
        Ok(seconds)
    } else {
        Err(SecondsError::NotPositive(seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_with_and_without_units() {
        assert_eq!(parse_seconds("60"), Ok(60.0));
        assert_eq!(parse_seconds(" 1 min "), Ok(60.0));
        assert_eq!(parse_seconds("2 hr"), Ok(7200.0));
    }

    #[test]
    fn unusable_durations() {
        assert_eq!(parse_seconds(""), Err(SecondsError::Empty));
        assert_eq!(parse_seconds("0"), Err(SecondsError::NotPositive(0.0)));
        assert_eq!(parse_seconds("-3"), Err(SecondsError::NotPositive(-3.0)));
        assert!(matches!(parse_seconds("inf"), Err(SecondsError::NotPositive(_))));
        assert!(matches!(parse_seconds("soon"), Err(SecondsError::Malformed(_))));
    }
}
