use crate::error::{Error, Result};
use crate::offsets::compact_offsets;

/// 紧凑的不规则数组：`offsets` 从 0 开始，与 `values` 连续对应
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JaggedArray {
    pub offsets: Vec<i64>,
    pub values: Vec<i64>,
}

impl JaggedArray {
    /// 校验后构造
    pub fn new(offsets: Vec<i64>, values: Vec<i64>) -> Result<Self> {
        if offsets.first().copied().unwrap_or(0) != 0 {
            return Err(Error::InvalidArgument("offsets must start at 0".into()));
        }
        for (i, w) in offsets.windows(2).enumerate() {
            if w[1] < w[0] {
                return Err(Error::DecreasingOffsets {
                    index: i,
                    start: w[0],
                    stop: w[1],
                });
            }
        }
        let last = offsets.last().copied().unwrap_or(0);
        if last as u64 != values.len() as u64 {
            return Err(Error::InvalidArgument(format!(
                "offsets end at {} but there are {} values",
                last,
                values.len()
            )));
        }
        let offsets = if offsets.is_empty() { vec![0] } else { offsets };
        Ok(JaggedArray { offsets, values })
    }

    pub fn from_lists<I, L>(lists: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[i64]>,
    {
        let mut offsets = vec![0i64];
        let mut values = Vec::new();
        for list in lists {
            values.extend_from_slice(list.as_ref());
            offsets.push(values.len() as i64);
        }
        JaggedArray { offsets, values }
    }

    /// 列表个数
    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list(&self, i: usize) -> Option<&[i64]> {
        if i >= self.len() {
            return None;
        }
        let s = self.offsets[i] as usize;
        let e = self.offsets[i + 1] as usize;
        self.values.get(s..e)
    }

    pub fn as_view(&self) -> JaggedView<'_> {
        JaggedView {
            offsets: &self.offsets,
            values: &self.values,
        }
    }
}

/// 借用视图：局部偏移段指向一个更大的全局值缓冲区，偏移不必从 0 开始
#[derive(Debug, Clone, Copy)]
pub struct JaggedView<'a> {
    pub offsets: &'a [i64],
    pub values: &'a [i64],
}

impl<'a> JaggedView<'a> {
    pub fn new(offsets: &'a [i64], values: &'a [i64]) -> Self {
        JaggedView { offsets, values }
    }

    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 该视图在全局值缓冲区中覆盖的值
    pub fn value_slice(&self) -> Result<&'a [i64]> {
        if self.is_empty() {
            return Ok(&[]);
        }
        let first = self.offsets[0];
        let last = self.offsets[self.len()];
        if first < 0 || last < first {
            return Err(Error::InvalidArgument(format!(
                "invalid value range {}..{}",
                first, last
            )));
        }
        let (s, e) = (first as usize, last as usize);
        self.values.get(s..e).ok_or(Error::OutOfBounds {
            needed: e,
            available: self.values.len(),
        })
    }

    /// 重新打包成独立的紧凑数组
    pub fn compact(&self) -> Result<JaggedArray> {
        let offsets = compact_offsets(self.offsets, self.len())?;
        let values = self.value_slice()?.to_vec();
        Ok(JaggedArray { offsets, values })
    }
}

/// 块规划
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPlan {
    pub start_list: usize,
    pub end_list: usize,
    pub n_values: usize,
}

/// 根据目标值数量规划块；每个块至少包含一个列表
pub fn plan_blocks_by_target_len(offsets: &[i64], target_block_len: usize) -> Vec<BlockPlan> {
    let mut plans = Vec::new();
    let n_lists = offsets.len().saturating_sub(1);
    let mut acc = 0usize;
    let mut block_start = 0usize;

    for j in 0..n_lists {
        let len = offsets[j + 1].saturating_sub(offsets[j]).max(0) as usize;
        acc = acc.saturating_add(len);
        if acc >= target_block_len {
            plans.push(BlockPlan {
                start_list: block_start,
                end_list: j + 1,
                n_values: acc,
            });
            block_start = j + 1;
            acc = 0;
        }
    }
    if block_start < n_lists {
        plans.push(BlockPlan {
            start_list: block_start,
            end_list: n_lists,
            n_values: acc,
        });
    }
    plans
}
