/// 编码参数；默认值与 Python 接口的关键字参数一致
#[derive(Debug, Clone, PartialEq)]
pub struct CodecOptions {
    /// 每个块的目标值数量
    pub target_block_len: usize,
    /// 是否尝试块级 xz 压缩（需要 `xz` feature）
    pub block_xz: bool,
    pub block_xz_level: i32,
    /// 小于该字节数的流不尝试 xz
    pub block_xz_min_bytes: usize,
    /// 压缩后大小低于原大小 * ratio 才采用 xz
    pub block_xz_min_ratio: f64,
}

impl Default for CodecOptions {
    fn default() -> Self {
        CodecOptions {
            target_block_len: 131072,
            block_xz: false,
            block_xz_level: 9,
            block_xz_min_bytes: 4096,
            block_xz_min_ratio: 0.99,
        }
    }
}

impl CodecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target_block_len(mut self, target_block_len: usize) -> Self {
        self.target_block_len = target_block_len;
        self
    }

    pub fn with_xz(mut self, level: i32) -> Self {
        self.block_xz = true;
        self.block_xz_level = level;
        self
    }

    pub fn with_xz_thresholds(mut self, min_bytes: usize, min_ratio: f64) -> Self {
        self.block_xz_min_bytes = min_bytes;
        self.block_xz_min_ratio = min_ratio;
        self
    }

    /// Clamp level to [0,9]
    pub fn xz_level(&self) -> u32 {
        self.block_xz_level.clamp(0, 9) as u32
    }
}
