//! 错误类型

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("out of bounds: need {needed} elements, have {available}")]
    OutOfBounds { needed: usize, available: usize },

    #[error("decreasing offsets at list {index}: {start} -> {stop}")]
    DecreasingOffsets { index: usize, start: i64, stop: i64 },

    #[error("unexpected end of bit stream")]
    EndOfStream,

    #[error("bit stream is closed")]
    ClosedStream,

    #[error("format error: {0}")]
    Format(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
