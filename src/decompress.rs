use std::io::{Cursor, ErrorKind, Read};

use rayon::prelude::*;

use crate::bitstream::BitReader;
use crate::compress::{ENC_RAW, ENC_XZ, MAGIC, VERSION};
use crate::error::{Error, Result};
use crate::golomb_rice::{decode_golomb_rice_number, zigzag_decode};
use crate::jagged::JaggedArray;
use crate::offsets::offsets_from_lengths;
use crate::varint::{read_varint, read_varint_usize};

/// 单个块的元数据和负载
struct EncodedBlock<'a> {
    n_lists: usize,
    n_values: usize,
    k_len: u32,
    k_val: u32,
    len_enc: u64,
    len_bytes: &'a [u8],
    val_enc: u64,
    val_bytes: &'a [u8],
}

fn truncated(e: std::io::Error) -> Error {
    match e.kind() {
        ErrorKind::UnexpectedEof => Error::Format("truncated JAGZ data".into()),
        _ => Error::Io(e),
    }
}

/// 位流提前结束说明数据已损坏
fn corrupt(e: Error) -> Error {
    match e {
        Error::EndOfStream => Error::Format("block stream ended early".into()),
        other => other,
    }
}

fn read_u32(bio: &mut Cursor<&[u8]>) -> Result<u32> {
    let mut b = [0u8; 4];
    bio.read_exact(&mut b).map_err(truncated)?;
    Ok(u32::from_le_bytes(b))
}

fn read_u64(bio: &mut Cursor<&[u8]>) -> Result<u64> {
    let mut b = [0u8; 8];
    bio.read_exact(&mut b).map_err(truncated)?;
    Ok(u64::from_le_bytes(b))
}

fn read_k(bio: &mut Cursor<&[u8]>) -> Result<u32> {
    let k = read_varint(bio)?;
    if k > 62 {
        return Err(Error::Format(format!("invalid Golomb-Rice parameter {}", k)));
    }
    Ok(k as u32)
}

/// 从游标当前位置借出 `len` 个字节
fn take_slice<'a>(bio: &mut Cursor<&'a [u8]>, len: usize) -> Result<&'a [u8]> {
    let data: &'a [u8] = *bio.get_ref();
    let start = bio.position() as usize;
    let end = start
        .checked_add(len)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| Error::Format("truncated JAGZ data".into()))?;
    bio.set_position(end as u64);
    Ok(&data[start..end])
}

/// 解压缩 JAGZ 字节流
pub fn decompress_jagged(blob: &[u8]) -> Result<JaggedArray> {
    let mut bio = Cursor::new(blob);

    let mut magic = [0u8; 4];
    bio.read_exact(&mut magic).map_err(truncated)?;
    if &magic != MAGIC {
        return Err(Error::Format("Invalid JAGZ data: magic mismatch".into()));
    }
    let version = read_u32(&mut bio)?;
    if version != VERSION {
        return Err(Error::Format(format!(
            "Unsupported version: {} (only v{} supported)",
            version, VERSION
        )));
    }

    let n_lists = read_u64(&mut bio)?;
    let n_values = read_u64(&mut bio)?;
    let n_blocks = read_varint_usize(&mut bio)?;

    let mut blocks = Vec::new();
    let mut next_list = 0u64;
    for _ in 0..n_blocks {
        let start = read_varint(&mut bio)?;
        if start != next_list {
            return Err(Error::Format(format!(
                "block starts at list {} but {} expected",
                start, next_list
            )));
        }
        let block_lists = read_varint_usize(&mut bio)?;
        let block_values = read_varint_usize(&mut bio)?;
        let k_len = read_k(&mut bio)?;
        let k_val = read_k(&mut bio)?;

        let len_enc = read_varint(&mut bio)?;
        let len_size = read_varint_usize(&mut bio)?;
        let val_enc = read_varint(&mut bio)?;
        let val_size = read_varint_usize(&mut bio)?;
        let len_bytes = take_slice(&mut bio, len_size)?;
        let val_bytes = take_slice(&mut bio, val_size)?;

        next_list = next_list
            .checked_add(block_lists as u64)
            .ok_or_else(|| Error::Format("block list counts overflow".into()))?;
        blocks.push(EncodedBlock {
            n_lists: block_lists,
            n_values: block_values,
            k_len,
            k_val,
            len_enc,
            len_bytes,
            val_enc,
            val_bytes,
        });
    }
    if next_list != n_lists {
        return Err(Error::Format(format!(
            "blocks cover {} lists but header declares {}",
            next_list, n_lists
        )));
    }

    let decoded: Vec<(Vec<u64>, Vec<i64>)> = blocks
        .par_iter()
        .map(decode_block)
        .collect::<Result<Vec<_>>>()?;

    let mut lengths = Vec::new();
    let mut values = Vec::new();
    for (block_lengths, block_values) in decoded {
        lengths.extend(block_lengths);
        values.extend(block_values);
    }
    if values.len() as u64 != n_values {
        return Err(Error::Format(format!(
            "decoded {} values but header declares {}",
            values.len(),
            n_values
        )));
    }

    let offsets = offsets_from_lengths(&lengths)?;
    tracing::debug!(lists = lengths.len(), values = values.len(), blocks = n_blocks, "decoded jagged array");
    Ok(JaggedArray { offsets, values })
}

fn decode_block(blk: &EncodedBlock<'_>) -> Result<(Vec<u64>, Vec<i64>)> {
    let len_bytes = decode_stream(blk.len_enc, blk.len_bytes)?;
    let val_bytes = decode_stream(blk.val_enc, blk.val_bytes)?;

    let mut len_br = BitReader::from_bytes(&len_bytes);
    let mut lengths = Vec::new();
    let mut total = 0u64;
    for _ in 0..blk.n_lists {
        let len = decode_golomb_rice_number(blk.k_len, &mut len_br).map_err(corrupt)?;
        total = total
            .checked_add(len)
            .ok_or_else(|| Error::Format("list lengths overflow".into()))?;
        lengths.push(len);
    }
    if total != blk.n_values as u64 {
        return Err(Error::Format(format!(
            "block lists hold {} values but block declares {}",
            total, blk.n_values
        )));
    }

    let mut val_br = BitReader::from_bytes(&val_bytes);
    let mut values = Vec::new();
    for _ in 0..blk.n_values {
        let u = decode_golomb_rice_number(blk.k_val, &mut val_br).map_err(corrupt)?;
        values.push(zigzag_decode(u));
    }
    Ok((lengths, values))
}

/// 解压缩（如果需要）
fn decode_stream(enc: u64, bytes: &[u8]) -> Result<Vec<u8>> {
    match enc {
        ENC_RAW => Ok(bytes.to_vec()),
        ENC_XZ => {
            #[cfg(feature = "xz")]
            {
                use xz2::read::XzDecoder;
                let mut decoder = XzDecoder::new(bytes);
                let mut decompressed = Vec::new();
                decoder.read_to_end(&mut decompressed)?;
                Ok(decompressed)
            }
            #[cfg(not(feature = "xz"))]
            {
                Err(Error::Unsupported(
                    "xz decompression required but not available".into(),
                ))
            }
        }
        other => Err(Error::Format(format!("unknown stream encoding {}", other))),
    }
}
