//! The few unit services stream reduction needs: recognising time
//! locations, converting between time offsets and parsing the cadence and
//! cache tag properties.

use core::fmt;
use std::str::FromStr;

mod cache_tag;
pub use cache_tag::{CacheTag, Resolution};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Not a time offset unit: {0:?}")]
    UnknownOffsetUnit(String),
    #[error("Not a time location unit: {0:?}")]
    UnknownLocationUnit(String),
    #[error("Expected a number followed by a unit, got: {0:?}")]
    MalformedDatum(String),
    #[error("Expected `<range> @ <resolution>`, got: {0:?}")]
    MalformedCacheTag(String),
}

/// Units for durations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeOffsetUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeOffsetUnit {
    /// length of one unit in seconds
    pub fn seconds(self) -> f64 {
        match self {
            Self::Nanoseconds => 1e-9,
            Self::Microseconds => 1e-6,
            Self::Milliseconds => 1e-3,
            Self::Seconds => 1.0,
            Self::Minutes => 60.0,
            Self::Hours => 3_600.0,
            Self::Days => 86_400.0,
        }
    }

    pub fn convert(self, value: f64, to: TimeOffsetUnit) -> f64 {
        if self == to {
            return value;
        }
        value * self.seconds() / to.seconds()
    }
}

impl FromStr for TimeOffsetUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ns" | "nanoseconds" => Self::Nanoseconds,
            "us" | "μs" | "microseconds" => Self::Microseconds,
            "ms" | "milliseconds" => Self::Milliseconds,
            "s" | "sec" | "seconds" => Self::Seconds,
            "min" | "minutes" => Self::Minutes,
            "hr" | "hours" => Self::Hours,
            "days" => Self::Days,
            _ => return Err(Error::UnknownOffsetUnit(s.to_owned())),
        })
    }
}

impl fmt::Display for TimeOffsetUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nanoseconds => "ns",
            Self::Microseconds => "us",
            Self::Milliseconds => "ms",
            Self::Seconds => "s",
            Self::Minutes => "min",
            Self::Hours => "hr",
            Self::Days => "days",
        })
    }
}

/// Units for points in time, an offset unit counted from an epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeLocationUnit {
    /// microseconds since 2000-01-01T00:00
    Us2000,
    /// seconds since 2000-01-01T00:00
    T2000,
    /// seconds since 1970-01-01T00:00
    T1970,
    /// milliseconds since 1970-01-01T00:00
    Ms1970,
    /// days since 1958-01-01T00:00
    Mj1958,
}

const SECONDS_1970_TO_2000: f64 = 946_684_800.0;
const DAYS_1958_TO_2000: f64 = 15_340.0;

impl TimeLocationUnit {
    /// unit in which differences between two locations are expressed
    pub fn offset_unit(self) -> TimeOffsetUnit {
        match self {
            Self::Us2000 => TimeOffsetUnit::Microseconds,
            Self::T2000 | Self::T1970 => TimeOffsetUnit::Seconds,
            Self::Ms1970 => TimeOffsetUnit::Milliseconds,
            Self::Mj1958 => TimeOffsetUnit::Days,
        }
    }

    /// the epoch in seconds relative to 2000-01-01T00:00
    fn epoch_t2000(self) -> f64 {
        match self {
            Self::Us2000 | Self::T2000 => 0.0,
            Self::T1970 | Self::Ms1970 => -SECONDS_1970_TO_2000,
            Self::Mj1958 => -DAYS_1958_TO_2000 * 86_400.0,
        }
    }

    pub fn convert(self, value: f64, to: TimeLocationUnit) -> f64 {
        if self == to {
            return value;
        }
        let t2000 = value * self.offset_unit().seconds() + self.epoch_t2000();
        (t2000 - to.epoch_t2000()) / to.offset_unit().seconds()
    }
}

impl FromStr for TimeLocationUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "us2000" => Self::Us2000,
            "t2000" => Self::T2000,
            "t1970" => Self::T1970,
            "ms1970" => Self::Ms1970,
            "mj1958" => Self::Mj1958,
            _ => return Err(Error::UnknownLocationUnit(s.to_owned())),
        })
    }
}

impl fmt::Display for TimeLocationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Us2000 => "us2000",
            Self::T2000 => "t2000",
            Self::T1970 => "t1970",
            Self::Ms1970 => "ms1970",
            Self::Mj1958 => "mj1958",
        })
    }
}

/// `None` if the units are missing or not a point in time
pub fn time_location(units: Option<&str>) -> Option<TimeLocationUnit> {
    units.and_then(|token| token.trim().parse().ok())
}

/// A duration with its unit, written as `"<number> <unit>"`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Datum {
    pub value: f64,
    pub unit: TimeOffsetUnit,
}

impl Datum {
    pub fn from_seconds(seconds: f64) -> Self {
        Self {
            value: seconds,
            unit: TimeOffsetUnit::Seconds,
        }
    }
    pub fn seconds(&self) -> f64 {
        self.unit.convert(self.value, TimeOffsetUnit::Seconds)
    }
}

impl FromStr for Datum {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_alphabetic() && c != 'e' && c != 'E')
            .ok_or_else(|| Error::MalformedDatum(s.to_owned()))?;
        let (number, unit) = s.split_at(split);
        let value = number
            .trim()
            .parse()
            .map_err(|_| Error::MalformedDatum(s.to_owned()))?;
        Ok(Self {
            value,
            unit: unit.trim().parse()?,
        })
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}
