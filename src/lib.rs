//! Offset compaction and MSB-first bit streams, plus the JAGZ jagged-array
//! codec built on top of them.

pub mod bitstream;
pub mod compress;
pub mod config;
pub mod decompress;
pub mod error;
pub mod golomb_rice;
pub mod jagged;
pub mod offsets;
pub mod varint;

#[cfg(feature = "python")]
mod python;

pub use bitstream::{BitReader, BitWriter, Ownership};
pub use compress::compress_jagged;
pub use config::CodecOptions;
pub use decompress::decompress_jagged;
pub use error::{Error, Result};
pub use jagged::{BlockPlan, JaggedArray, JaggedView};
pub use offsets::{
    compact_offsets, compact_offsets_into, compact_offsets_into_with, compact_offsets_with,
    compact_starts_stops, Validation,
};
