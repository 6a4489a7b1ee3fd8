//! Framing of a stream on a byte channel.
//!
//! Headers are RON text behind a tag naming what they describe and how long
//! they are: `[NN]LLLLLL` followed by `LLLLLL` bytes of RON. `NN` is `00`
//! for the stream descriptor, the schema id for a schema and `xx` for an
//! [`OutOfBand`] message. Data packets are `:NN:` followed by exactly the
//! packet size of schema `NN` in bytes.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::stream::{Comment, StreamError};

mod format;
mod read;

pub use format::Formatter;
pub use read::{ReadError, Reader};

/// Id field of the stream descriptor header
pub(crate) const STREAM_ID: &str = "00";
/// Id field of out of band headers
pub(crate) const OUT_OF_BAND_ID: &str = "xx";
/// Headers give their length in this many decimal digits
pub(crate) const LENGTH_DIGITS: usize = 6;
pub(crate) const MAX_HEADER_LEN: usize = 999_999;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutOfBand {
    Comment(Comment),
    Exception(StreamError),
}

/// `None` for standard input or output
fn file_path(path: Option<&Path>) -> Option<&Path> {
    path.filter(|path| *path != Path::new("-"))
}

/// Opens a file or, for `None` or `-`, standard input
pub fn open_input(path: Option<&Path>) -> io::Result<Box<dyn Read>> {
    let input: Box<dyn Read> = match file_path(path) {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(io::stdin().lock()),
    };
    Ok(input)
}

/// Creates a file or, for `None` or `-`, returns standard output. Output is
/// buffered, [`Formatter`] flushes it at stream end.
pub fn create_output(path: Option<&Path>) -> io::Result<Box<dyn Write>> {
    let output: Box<dyn Write> = match file_path(path) {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    Ok(output)
}
