use std::io::{Read, Write};

use crate::bitstream::{BitReader, BitWriter};
use crate::error::Result;

/// 把有符号整数映射到无符号：0, -1, 1, -2, ... -> 0, 1, 2, 3, ...
#[inline]
pub fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

#[inline]
pub fn zigzag_decode(u: u64) -> i64 {
    ((u >> 1) as i64) ^ -((u & 1) as i64)
}

/// 使用 Golomb-Rice 编码数字数组
pub fn encode_golomb_rice_numbers<W: Write>(
    numbers: &[u64],
    k: u32,
    bw: &mut BitWriter<W>,
) -> Result<()> {
    let mask = if k > 0 { (1u64 << k) - 1 } else { 0 };
    for &n in numbers {
        bw.write_unary(n >> k)?;
        if k > 0 {
            bw.write_bits(n & mask, k)?;
        }
    }
    Ok(())
}

/// 解码单个 Golomb-Rice 数
pub fn decode_golomb_rice_number<R: Read>(k: u32, br: &mut BitReader<R>) -> Result<u64> {
    let q = br.read_unary()?;
    let r = br.read_bits(k)?;
    Ok((q << k) | r)
}

/// 为给定的非负整数选择最优的 k 值（0..=k_max），最小化 GR 位成本
pub fn select_optimal_gr_k(numbers: &[u64], k_max: Option<u32>) -> u32 {
    let max_val = match numbers.iter().max() {
        Some(&m) if m > 0 => m,
        _ => return 0,
    };

    let k_max = k_max
        .unwrap_or_else(|| 64 - max_val.leading_zeros())
        .min(62);

    let mut best_k = 0u32;
    let mut best_cost = u128::MAX;
    let count = numbers.len() as u128;

    for k in 0..=k_max {
        // Unary cost q+1 per number, plus k remainder bits
        let q_sum: u128 = numbers.iter().map(|&n| (n >> k) as u128).sum();
        let cost = q_sum + count + count * k as u128;
        if cost < best_cost {
            best_cost = cost;
            best_k = k;
        }
    }

    best_k
}
