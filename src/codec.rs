use core::fmt;
use std::str::FromStr;

use byteorder::{BigEndian, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::stream::ByteOrder;

mod text_time;
pub use text_time::parse_time;

pub(crate) const MIN_ASCII_WIDTH: u8 = 6;
pub(crate) const MIN_TIME_WIDTH: u8 = 20;
pub(crate) const MAX_TEXT_WIDTH: u8 = 64;

/// Fixed width encoding of a single numeric value.
///
/// Text variants always end in a blank so records stay delimited when read
/// by humans or line based tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TransferType {
    Real8,
    Real4,
    Int8,
    Int4,
    Int2,
    Int1,
    UInt1,
    /// exponent notation, right aligned
    Ascii { width: u8 },
    /// calendar time of a us2000 value
    Time { width: u8 },
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Unknown transfer type: {0:?}")]
    Unknown(String),
    #[error("Width of {name} must lie in {min}..={max}, got: {width}")]
    Width {
        name: &'static str,
        width: usize,
        min: u8,
        max: u8,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Need {needed} bytes to decode a {transfer_type} but only {left} are left")]
    Truncated {
        transfer_type: TransferType,
        needed: usize,
        left: usize,
    },
    #[error("Text field is not valid utf8: {0}")]
    NotUtf8(std::str::Utf8Error),
    #[error("Could not parse {text:?} as a number")]
    NotANumber { text: String },
    #[error("Could not parse {text:?} as a time: {source}")]
    NotATime {
        text: String,
        source: time::error::Parse,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("{value} can not be represented as {transfer_type}")]
    OutOfRange {
        value: f64,
        transfer_type: TransferType,
    },
    #[error("Text for {value} needs {needed} characters, {transfer_type} only has room for {available}")]
    TooWide {
        value: f64,
        transfer_type: TransferType,
        needed: usize,
        available: usize,
    },
    #[error("{value} us2000 lies outside the supported calendar")]
    TimeOutOfRange { value: f64 },
}

impl TransferType {
    /// Number of bytes one encoded value takes
    pub fn width(&self) -> usize {
        match self {
            Self::Real8 | Self::Int8 => 8,
            Self::Real4 | Self::Int4 => 4,
            Self::Int2 => 2,
            Self::Int1 | Self::UInt1 => 1,
            Self::Ascii { width } | Self::Time { width } => *width as usize,
        }
    }

    pub fn is_ascii(&self) -> bool {
        matches!(self, Self::Ascii { .. } | Self::Time { .. })
    }

    /// The text encoding that represents every value of this encoding
    /// without loss.
    pub fn ascii_equivalent(&self) -> TransferType {
        let width = match self {
            Self::Real8 | Self::Int8 => 25,
            Self::Real4 => 17,
            Self::Int4 => 18,
            Self::Int2 => 13,
            Self::Int1 | Self::UInt1 => 11,
            Self::Ascii { .. } | Self::Time { .. } => return *self,
        };
        Self::Ascii { width }
    }

    /// Reads one value from the front of `cursor` and advances it past
    /// the value.
    pub fn decode(&self, order: ByteOrder, cursor: &mut &[u8]) -> Result<f64, DecodeError> {
        let width = self.width();
        if cursor.len() < width {
            return Err(DecodeError::Truncated {
                transfer_type: *self,
                needed: width,
                left: cursor.len(),
            });
        }
        let (bytes, rest) = cursor.split_at(width);
        *cursor = rest;

        match (self, order) {
            (Self::Ascii { .. }, _) => decode_ascii(bytes),
            (Self::Time { .. }, _) => text_time::decode(bytes),
            (_, ByteOrder::Big) => Ok(self.decode_binary::<BigEndian>(bytes)),
            (_, ByteOrder::Little) => Ok(self.decode_binary::<LittleEndian>(bytes)),
        }
    }

    /// Appends exactly [`width`](Self::width) bytes to `out`
    pub fn encode(
        &self,
        order: ByteOrder,
        value: f64,
        out: &mut Vec<u8>,
    ) -> Result<(), EncodeError> {
        match (self, order) {
            (Self::Ascii { width }, _) => self.encode_ascii(*width as usize, value, out),
            (Self::Time { width }, _) => text_time::encode(*width as usize, value, out),
            (_, ByteOrder::Big) => self.encode_binary::<BigEndian>(value, out),
            (_, ByteOrder::Little) => self.encode_binary::<LittleEndian>(value, out),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn decode_binary<B: byteorder::ByteOrder>(&self, bytes: &[u8]) -> f64 {
        match self {
            Self::Real8 => B::read_f64(bytes),
            Self::Real4 => f64::from(B::read_f32(bytes)),
            Self::Int8 => B::read_i64(bytes) as f64,
            Self::Int4 => f64::from(B::read_i32(bytes)),
            Self::Int2 => f64::from(B::read_i16(bytes)),
            Self::Int1 => f64::from(bytes[0] as i8),
            Self::UInt1 => f64::from(bytes[0]),
            Self::Ascii { .. } | Self::Time { .. } => {
                unreachable!("text encodings are never decoded as binary")
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_binary<B: byteorder::ByteOrder>(
        &self,
        value: f64,
        out: &mut Vec<u8>,
    ) -> Result<(), EncodeError> {
        let out_of_range = || EncodeError::OutOfRange {
            value,
            transfer_type: *self,
        };
        let mut buf = [0u8; 8];
        match self {
            Self::Real8 => B::write_f64(&mut buf, value),
            Self::Real4 => B::write_f32(&mut buf, value as f32),
            Self::Int8 => B::write_i64(&mut buf, integer(value).ok_or_else(out_of_range)?),
            Self::Int4 => B::write_i32(&mut buf, integer(value).ok_or_else(out_of_range)?),
            Self::Int2 => B::write_i16(&mut buf, integer(value).ok_or_else(out_of_range)?),
            Self::Int1 => buf[0] = integer::<i8>(value).ok_or_else(out_of_range)? as u8,
            Self::UInt1 => buf[0] = integer::<u8>(value).ok_or_else(out_of_range)?,
            Self::Ascii { .. } | Self::Time { .. } => {
                unreachable!("text encodings are never encoded as binary")
            }
        }
        out.extend_from_slice(&buf[..self.width()]);
        Ok(())
    }

    fn encode_ascii(&self, width: usize, value: f64, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        let available = width - 1;
        // sign, leading digit, point, `e`, exponent sign and three digits
        // plus the trailing blank
        let precision = width.saturating_sub(9);
        let text = format!("{value:.precision$e}");
        if text.len() > available {
            return Err(EncodeError::TooWide {
                value,
                transfer_type: *self,
                needed: text.len(),
                available,
            });
        }
        let start = out.len();
        out.extend(std::iter::repeat(b' ').take(available - text.len()));
        out.extend_from_slice(text.as_bytes());
        out.push(b' ');
        debug_assert_eq!(out.len() - start, width);
        Ok(())
    }
}

/// Rounds to the nearest integer, `None` if that does not fit `T`
fn integer<T: num_traits::NumCast>(value: f64) -> Option<T> {
    num_traits::cast(value.round())
}

fn decode_ascii(bytes: &[u8]) -> Result<f64, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(DecodeError::NotUtf8)?;
    let text = text.trim();
    text.parse().map_err(|_| DecodeError::NotANumber {
        text: text.to_owned(),
    })
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real8 => f.write_str("double"),
            Self::Real4 => f.write_str("float"),
            Self::Int8 => f.write_str("int8"),
            Self::Int4 => f.write_str("int4"),
            Self::Int2 => f.write_str("int2"),
            Self::Int1 => f.write_str("int1"),
            Self::UInt1 => f.write_str("uint1"),
            Self::Ascii { width } => write!(f, "ascii{width}"),
            Self::Time { width } => write!(f, "time{width}"),
        }
    }
}

impl FromStr for TransferType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn width(name: &'static str, digits: &str, min: u8) -> Result<u8, ParseError> {
            let Ok(width) = digits.parse::<usize>() else {
                return Err(ParseError::Unknown(format!("{name}{digits}")));
            };
            if width < min as usize || width > MAX_TEXT_WIDTH as usize {
                return Err(ParseError::Width {
                    name,
                    width,
                    min,
                    max: MAX_TEXT_WIDTH,
                });
            }
            Ok(width as u8)
        }

        Ok(match s {
            "double" => Self::Real8,
            "float" => Self::Real4,
            "int8" => Self::Int8,
            "int4" => Self::Int4,
            "int2" => Self::Int2,
            "int1" => Self::Int1,
            "uint1" => Self::UInt1,
            _ => {
                if let Some(digits) = s.strip_prefix("ascii") {
                    Self::Ascii {
                        width: width("ascii", digits, MIN_ASCII_WIDTH)?,
                    }
                } else if let Some(digits) = s.strip_prefix("time") {
                    Self::Time {
                        width: width("time", digits, MIN_TIME_WIDTH)?,
                    }
                } else {
                    return Err(ParseError::Unknown(s.to_owned()));
                }
            }
        })
    }
}

impl TryFrom<String> for TransferType {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TransferType> for String {
    fn from(val: TransferType) -> Self {
        val.to_string()
    }
}
