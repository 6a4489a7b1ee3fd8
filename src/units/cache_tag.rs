use core::fmt;
use std::str::FromStr;

use super::{Datum, Error};

/// Extent and resolution a stream validly covers, written as
/// `"<range> @ <resolution>"`. The range is kept as opaque text.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheTag {
    pub range: String,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// full native resolution of the source
    Intrinsic,
    Datum(Datum),
}

impl CacheTag {
    #[must_use]
    pub fn with_resolution(self, resolution: Resolution) -> Self {
        Self { resolution, ..self }
    }
}

impl FromStr for CacheTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || Error::MalformedCacheTag(s.to_owned());
        let (range, resolution) = s.rsplit_once('@').ok_or_else(malformed)?;
        let range = range.trim();
        if range.is_empty() {
            return Err(malformed());
        }
        let resolution = match resolution.trim() {
            "intrinsic" => Resolution::Intrinsic,
            datum => Resolution::Datum(datum.parse()?),
        };
        Ok(Self {
            range: range.to_owned(),
            resolution,
        })
    }
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resolution {
            Resolution::Intrinsic => write!(f, "{} @ intrinsic", self.range),
            Resolution::Datum(datum) => write!(f, "{} @ {datum}", self.range),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANGE: &str = "2014-01-01T00:00 to 2014-01-02T00:00";

    #[test]
    fn intrinsic_then_resolved() {
        let tag: CacheTag = format!("{RANGE} @ intrinsic").parse().unwrap();
        assert_eq!(tag.range, RANGE);
        assert_eq!(tag.resolution, Resolution::Intrinsic);

        let tag = tag.with_resolution(Resolution::Datum(Datum::from_seconds(60.0)));
        assert_eq!(tag.to_string(), format!("{RANGE} @ 60 s"));
    }

    #[test]
    fn resolution_must_be_a_duration() {
        let err = format!("{RANGE} @ fine").parse::<CacheTag>().unwrap_err();
        assert!(matches!(err, Error::MalformedDatum(_)));
        let err = RANGE.parse::<CacheTag>().unwrap_err();
        assert!(matches!(err, Error::MalformedCacheTag(_)));
    }
}
