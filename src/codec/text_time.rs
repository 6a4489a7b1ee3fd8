//! Calendar text for values in microseconds since 2000-01-01T00:00 (us2000)

use time::macros::{datetime, format_description};
use time::{Duration, PrimitiveDateTime};

use super::{DecodeError, EncodeError};

const EPOCH: PrimitiveDateTime = datetime!(2000-01-01 0:00);

/// Parses `YYYY-MM-DDTHH:MM[:SS[.f+]]` into us2000
pub fn parse_time(text: &str) -> Result<f64, DecodeError> {
    let trimmed = text.trim().trim_end_matches('.');
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute][optional [:[second][optional [.[subsecond]]]]]"
    );
    let time =
        PrimitiveDateTime::parse(trimmed, &format).map_err(|source| DecodeError::NotATime {
            text: trimmed.to_owned(),
            source,
        })?;
    #[allow(clippy::cast_precision_loss)]
    let micros = (time - EPOCH).whole_microseconds() as f64;
    Ok(micros)
}

pub(super) fn decode(bytes: &[u8]) -> Result<f64, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(DecodeError::NotUtf8)?;
    parse_time(text)
}

pub(super) fn encode(width: usize, value: f64, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let out_of_range = || EncodeError::TimeOutOfRange { value };
    if !value.is_finite() {
        return Err(out_of_range());
    }
    #[allow(clippy::cast_possible_truncation)]
    let micros = value.round() as i64;
    let time = EPOCH
        .checked_add(Duration::microseconds(micros))
        .ok_or_else(out_of_range)?;
    if !(0..=9999).contains(&time.year()) {
        return Err(out_of_range());
    }

    let text = format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:06}",
        time.year(),
        u8::from(time.month()),
        time.day(),
        time.hour(),
        time.minute(),
        time.second(),
        time.microsecond(),
    );
    let available = width - 1;
    let start = out.len();
    out.extend(text.bytes().take(available));
    out.resize(start + width, b' ');
    Ok(())
}
