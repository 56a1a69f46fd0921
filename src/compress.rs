use std::io::{Cursor, Write};

use rayon::prelude::*;

use crate::bitstream::BitWriter;
use crate::config::CodecOptions;
use crate::error::Result;
use crate::golomb_rice::{encode_golomb_rice_numbers, select_optimal_gr_k, zigzag_encode};
use crate::jagged::{plan_blocks_by_target_len, BlockPlan, JaggedView};
use crate::offsets::{compact_offsets, list_lengths};
use crate::varint::write_varint;

pub const MAGIC: &[u8; 4] = b"JAGZ";
pub const VERSION: u32 = 1;

/// 流编码方式
pub const ENC_RAW: u64 = 0;
pub const ENC_XZ: u64 = 1;

/// 压缩不规则数组视图到 JAGZ 字节流
///
/// 视图的局部偏移先被压缩成从 0 开始的偏移，递减的偏移会被拒绝。
pub fn compress_jagged(view: JaggedView<'_>, options: &CodecOptions) -> Result<Vec<u8>> {
    let offsets = compact_offsets(view.offsets, view.len())?;
    let values = view.value_slice()?;
    let n_lists = offsets.len() - 1;

    if options.block_xz && cfg!(not(feature = "xz")) {
        tracing::debug!("block_xz requested but the xz feature is disabled; writing raw streams");
    }

    let mut out = Cursor::new(Vec::new());

    // Magic + version
    out.write_all(MAGIC)?;
    out.write_all(&VERSION.to_le_bytes())?;
    out.write_all(&(n_lists as u64).to_le_bytes())?;
    out.write_all(&(values.len() as u64).to_le_bytes())?;

    let plans = plan_blocks_by_target_len(&offsets, options.target_block_len.max(1));
    write_varint(&mut out, plans.len() as u64)?;

    // collect 保持块的原始顺序
    let encoded_blocks: Vec<Vec<u8>> = plans
        .par_iter()
        .map(|plan| encode_block(plan, &offsets, values, options))
        .collect::<Result<Vec<_>>>()?;

    for blk in &encoded_blocks {
        out.write_all(blk)?;
    }

    let bytes = out.into_inner();
    tracing::debug!(
        lists = n_lists,
        values = values.len(),
        blocks = plans.len(),
        bytes = bytes.len(),
        "encoded jagged array"
    );
    Ok(bytes)
}

fn encode_block(
    plan: &BlockPlan,
    offsets: &[i64],
    values: &[i64],
    options: &CodecOptions,
) -> Result<Vec<u8>> {
    // 压缩后的偏移已校验为非递减
    let lengths: Vec<u64> = list_lengths(&offsets[plan.start_list..=plan.end_list])?
        .into_iter()
        .map(|len| len as u64)
        .collect();
    let s = offsets[plan.start_list] as usize;
    let e = offsets[plan.end_list] as usize;
    let mapped: Vec<u64> = values[s..e].iter().map(|&v| zigzag_encode(v)).collect();

    let k_len = select_optimal_gr_k(&lengths, None);
    let k_val = select_optimal_gr_k(&mapped, None);

    let mut len_bw = BitWriter::in_memory();
    encode_golomb_rice_numbers(&lengths, k_len, &mut len_bw)?;
    let mut val_bw = BitWriter::in_memory();
    encode_golomb_rice_numbers(&mapped, k_val, &mut val_bw)?;

    let (len_enc, len_bytes) = maybe_xz(len_bw.finish()?, options)?;
    let (val_enc, val_bytes) = maybe_xz(val_bw.finish()?, options)?;

    let mut blk = Vec::with_capacity(len_bytes.len() + val_bytes.len() + 32);
    write_varint(&mut blk, plan.start_list as u64)?;
    write_varint(&mut blk, (plan.end_list - plan.start_list) as u64)?;
    write_varint(&mut blk, plan.n_values as u64)?;
    write_varint(&mut blk, k_len as u64)?;
    write_varint(&mut blk, k_val as u64)?;

    // 流头和负载
    write_varint(&mut blk, len_enc)?;
    write_varint(&mut blk, len_bytes.len() as u64)?;
    write_varint(&mut blk, val_enc)?;
    write_varint(&mut blk, val_bytes.len() as u64)?;
    blk.write_all(&len_bytes)?;
    blk.write_all(&val_bytes)?;
    Ok(blk)
}

/// 可选的块级 xz 压缩
fn maybe_xz(bytes: Vec<u8>, options: &CodecOptions) -> Result<(u64, Vec<u8>)> {
    #[cfg(feature = "xz")]
    {
        use xz2::write::XzEncoder;

        if options.block_xz && bytes.len() >= options.block_xz_min_bytes {
            let mut encoder = XzEncoder::new(Vec::new(), options.xz_level());
            encoder.write_all(&bytes)?;
            let compressed = encoder.finish()?;
            if (compressed.len() as f64) < (bytes.len() as f64) * options.block_xz_min_ratio {
                return Ok((ENC_XZ, compressed));
            }
        }
    }
    #[cfg(not(feature = "xz"))]
    let _ = options;

    Ok((ENC_RAW, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::jagged::JaggedArray;

    #[test]
    fn test_header_layout() {
        let arr = JaggedArray::from_lists([vec![1i64, 2], vec![3]]);
        let bytes = compress_jagged(arr.as_view(), &CodecOptions::default()).unwrap();
        assert_eq!(&bytes[0..4], MAGIC);
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), VERSION);
        assert_eq!(u64::from_le_bytes(bytes[8..16].try_into().unwrap()), 2);
        assert_eq!(u64::from_le_bytes(bytes[16..24].try_into().unwrap()), 3);
        // 单个块
        assert_eq!(bytes[24], 1);
    }

    #[test]
    fn test_rejects_decreasing_view() {
        let values = [0i64; 8];
        let offsets = [4i64, 2, 6];
        let err = compress_jagged(JaggedView::new(&offsets, &values), &CodecOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::DecreasingOffsets { index: 0, .. }));
    }

    #[test]
    fn test_raw_streams_without_xz() {
        let bytes = vec![0u8; 10_000];
        let (enc, out) = maybe_xz(bytes.clone(), &CodecOptions::default()).unwrap();
        assert_eq!(enc, ENC_RAW);
        assert_eq!(out, bytes);
    }
}
