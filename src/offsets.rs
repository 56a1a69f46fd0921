//! 偏移数组压缩（compact offsets）
//!
//! 把某个大缓冲区中一段"局部"偏移 `fromoffsets[0..=length]` 变换成从 0 开始、
//! 与重新打包后的值缓冲区连续对应的偏移数组。输出类型始终为 `i64`。

use crate::error::{Error, Result};

/// 可作为偏移量输入的整数类型
pub trait Offset: Copy {
    fn to_i64(self) -> Option<i64>;
}

macro_rules! impl_offset {
    ($($t:ty),*) => {
        $(
            impl Offset for $t {
                #[inline]
                fn to_i64(self) -> Option<i64> {
                    i64::try_from(self).ok()
                }
            }
        )*
    };
}

impl_offset!(i8, u8, i16, u16, i32, u32, i64, u64, isize, usize);

/// 递减偏移的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validation {
    /// 遇到递减偏移立即报错
    #[default]
    Strict,
    /// 保留负的差值，输出可能非单调
    Permissive,
}

#[inline]
fn as_i64<T: Offset>(v: T) -> Result<i64> {
    v.to_i64()
        .ok_or_else(|| Error::InvalidArgument("offset does not fit in i64".into()))
}

fn list_delta(index: usize, start: i64, stop: i64, validation: Validation) -> Result<i64> {
    let delta = stop
        .checked_sub(start)
        .ok_or_else(|| Error::InvalidArgument(format!("offset delta overflows at list {}", index)))?;
    if delta < 0 && validation == Validation::Strict {
        return Err(Error::DecreasingOffsets { index, start, stop });
    }
    Ok(delta)
}

#[inline]
fn accumulate(prev: i64, delta: i64) -> Result<i64> {
    prev.checked_add(delta)
        .ok_or_else(|| Error::InvalidArgument("compacted offset overflows i64".into()))
}

fn output_len(length: usize) -> Result<usize> {
    length
        .checked_add(1)
        .ok_or_else(|| Error::InvalidArgument("length too large".into()))
}

/// 压缩偏移，返回新分配的 `length + 1` 个元素
pub fn compact_offsets<T: Offset>(fromoffsets: &[T], length: usize) -> Result<Vec<i64>> {
    compact_offsets_with(fromoffsets, length, Validation::default())
}

pub fn compact_offsets_with<T: Offset>(
    fromoffsets: &[T],
    length: usize,
    validation: Validation,
) -> Result<Vec<i64>> {
    let n = output_len(length)?;
    let mut tooffsets = vec![0i64; n];
    compact_offsets_into_with(fromoffsets, length, &mut tooffsets, validation)?;
    Ok(tooffsets)
}

/// 原地版本：只写 `tooffsets[..=length]`，其余元素保持不变
pub fn compact_offsets_into<T: Offset>(
    fromoffsets: &[T],
    length: usize,
    tooffsets: &mut [i64],
) -> Result<()> {
    compact_offsets_into_with(fromoffsets, length, tooffsets, Validation::default())
}

/// 原地版本。长度检查在任何写入之前完成；校验失败时
/// 失败位置之前的前缀可能已被写入。
pub fn compact_offsets_into_with<T: Offset>(
    fromoffsets: &[T],
    length: usize,
    tooffsets: &mut [i64],
    validation: Validation,
) -> Result<()> {
    let n = output_len(length)?;
    if tooffsets.len() < n {
        return Err(Error::OutOfBounds {
            needed: n,
            available: tooffsets.len(),
        });
    }
    // length == 0 时不访问 fromoffsets
    if length > 0 && fromoffsets.len() < n {
        return Err(Error::OutOfBounds {
            needed: n,
            available: fromoffsets.len(),
        });
    }

    tooffsets[0] = 0;
    if length == 0 {
        return Ok(());
    }
    let mut start = as_i64(fromoffsets[0])?;
    for i in 0..length {
        let stop = as_i64(fromoffsets[i + 1])?;
        let delta = list_delta(i, start, stop, validation)?;
        tooffsets[i + 1] = accumulate(tooffsets[i], delta)?;
        start = stop;
    }
    Ok(())
}

/// starts/stops 形式：第 i 个列表为 `starts[i]..stops[i]`
pub fn compact_starts_stops<T: Offset>(
    starts: &[T],
    stops: &[T],
    length: usize,
    validation: Validation,
) -> Result<Vec<i64>> {
    for arr in [starts, stops] {
        if arr.len() < length {
            return Err(Error::OutOfBounds {
                needed: length,
                available: arr.len(),
            });
        }
    }
    let mut tooffsets = vec![0i64; output_len(length)?];
    for i in 0..length {
        let delta = list_delta(i, as_i64(starts[i])?, as_i64(stops[i])?, validation)?;
        tooffsets[i + 1] = accumulate(tooffsets[i], delta)?;
    }
    Ok(tooffsets)
}

/// 各列表长度
pub fn list_lengths(offsets: &[i64]) -> Result<Vec<i64>> {
    offsets
        .windows(2)
        .enumerate()
        .map(|(i, w)| {
            w[1].checked_sub(w[0]).ok_or_else(|| {
                Error::InvalidArgument(format!("list length overflows at list {}", i))
            })
        })
        .collect()
}

/// 由列表长度重建从 0 开始的偏移
pub fn offsets_from_lengths(lengths: &[u64]) -> Result<Vec<i64>> {
    let mut offsets = Vec::with_capacity(lengths.len() + 1);
    offsets.push(0i64);
    let mut acc = 0i64;
    for &len in lengths {
        let len = i64::try_from(len)
            .map_err(|_| Error::InvalidArgument("list length does not fit in i64".into()))?;
        acc = accumulate(acc, len)?;
        offsets.push(acc);
    }
    Ok(offsets)
}
