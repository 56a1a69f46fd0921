//! MSB-first 位流读写器。
//!
//! 写入端逐位累积到 `rack`，满 8 位立即写出一个字节；读取端每次从底层
//! 字节源取一个字节放进 `rack`，再用 `mask` 从高位到低位依次取位。

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, ErrorKind, Read, Write};
use std::path::Path;

use crate::error::{Error, Result};

const TOP_BIT: u8 = 0x80;

/// 底层字节源/字节汇的所有权策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ownership {
    /// close 时释放底层资源
    Owned,
    /// 资源属于调用方：close 不会释放它，可通过 `into_inner` 取回
    #[default]
    Borrowed,
}

fn check_width(count: u32) -> Result<()> {
    if count > u64::BITS {
        return Err(Error::InvalidArgument(format!(
            "bit width {} exceeds {}",
            count,
            u64::BITS
        )));
    }
    Ok(())
}

/// 位写入器，用于 Golomb-Rice 和 unary 编码
pub struct BitWriter<W: Write> {
    sink: Option<W>,
    ownership: Ownership,
    rack: u8,
    mask: u8,
    closed: bool,
    bits_written: u64,
}

impl BitWriter<Vec<u8>> {
    /// 写入内存缓冲区
    pub fn in_memory() -> Self {
        BitWriter::with_ownership(Vec::new(), Ownership::Owned)
    }

    /// 补齐最后一个字节并返回全部输出
    pub fn finish(self) -> Result<Vec<u8>> {
        self.into_inner()
    }
}

impl BitWriter<BufWriter<File>> {
    /// 创建文件并持有它；close 时关闭文件
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(BitWriter::with_ownership(
            BufWriter::new(file),
            Ownership::Owned,
        ))
    }
}

impl<W: Write> BitWriter<W> {
    /// 包装调用方已打开的字节汇，不接管其生命周期
    pub fn new(sink: W) -> Self {
        BitWriter::with_ownership(sink, Ownership::Borrowed)
    }

    pub fn with_ownership(sink: W, ownership: Ownership) -> Self {
        BitWriter {
            sink: Some(sink),
            ownership,
            rack: 0,
            mask: TOP_BIT,
            closed: false,
            bits_written: 0,
        }
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// 已写入的位数（含尚未落盘的部分字节）
    pub fn bits_written(&self) -> u64 {
        self.bits_written
    }

    fn sink_mut(&mut self) -> Result<&mut W> {
        if self.closed {
            return Err(Error::ClosedStream);
        }
        self.sink.as_mut().ok_or(Error::ClosedStream)
    }

    /// 写入单个位。写满一个字节时立即输出；输出失败时状态保持不变。
    pub fn write_bit(&mut self, bit: bool) -> Result<()> {
        if self.closed {
            return Err(Error::ClosedStream);
        }
        let rack = if bit { self.rack | self.mask } else { self.rack };
        if self.mask == 1 {
            self.sink_mut()?.write_all(&[rack])?;
            self.rack = 0;
            self.mask = TOP_BIT;
        } else {
            self.rack = rack;
            self.mask >>= 1;
        }
        self.bits_written += 1;
        Ok(())
    }

    /// 写入 `code` 的低 `count` 位，高位在前。`count` 以上的位被忽略。
    pub fn write_bits(&mut self, code: u64, count: u32) -> Result<()> {
        if self.closed {
            return Err(Error::ClosedStream);
        }
        if count == 0 {
            return Ok(());
        }
        check_width(count)?;
        for i in (0..count).rev() {
            self.write_bit((code >> i) & 1 == 1)?;
        }
        Ok(())
    }

    /// q 个 1 后接一个 0
    pub fn write_unary(&mut self, q: u64) -> Result<()> {
        for _ in 0..q {
            self.write_bit(true)?;
        }
        self.write_bit(false)
    }

    /// 刷新底层字节汇（不补齐当前字节）
    pub fn flush(&mut self) -> Result<()> {
        self.sink_mut()?.flush()?;
        Ok(())
    }

    fn emit_partial(&mut self) -> Result<()> {
        if self.mask != TOP_BIT {
            let rack = self.rack;
            self.sink_mut()?.write_all(&[rack])?;
            self.rack = 0;
            self.mask = TOP_BIT;
        }
        Ok(())
    }

    /// 输出未满的最后一个字节（低位补零）并关闭。重复调用无副作用。
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.emit_partial().and_then(|_| self.flush());
        self.closed = true;
        if self.ownership == Ownership::Owned {
            self.sink = None;
        }
        tracing::trace!(bits = self.bits_written, ownership = ?self.ownership, "bit writer closed");
        result
    }

    /// 补齐并刷新后取回底层字节汇
    pub fn into_inner(mut self) -> Result<W> {
        if !self.closed {
            self.emit_partial()?;
            self.flush()?;
            self.closed = true;
        }
        self.sink.take().ok_or(Error::ClosedStream)
    }
}

impl<W: Write> Drop for BitWriter<W> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "bit writer failed to close on drop");
        }
    }
}

/// 位读取器，用于解码 unary 和定长位值
pub struct BitReader<R: Read> {
    source: Option<R>,
    ownership: Ownership,
    rack: u8,
    mask: u8,
    closed: bool,
    exhausted: bool,
}

impl<'a> BitReader<Cursor<&'a [u8]>> {
    pub fn from_bytes(data: &'a [u8]) -> Self {
        BitReader::with_ownership(Cursor::new(data), Ownership::Owned)
    }
}

impl BitReader<BufReader<File>> {
    /// 打开文件并持有它；close 时关闭文件
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(BitReader::with_ownership(
            BufReader::new(file),
            Ownership::Owned,
        ))
    }
}

impl<R: Read> BitReader<R> {
    /// 包装调用方已打开的字节源，不接管其生命周期
    pub fn new(source: R) -> Self {
        BitReader::with_ownership(source, Ownership::Borrowed)
    }

    pub fn with_ownership(source: R, ownership: Ownership) -> Self {
        BitReader {
            source: Some(source),
            ownership,
            rack: 0,
            mask: 0,
            closed: false,
            exhausted: false,
        }
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn refill(&mut self) -> Result<()> {
        if self.exhausted {
            return Err(Error::EndOfStream);
        }
        let source = self.source.as_mut().ok_or(Error::ClosedStream)?;
        let mut buf = [0u8; 1];
        loop {
            match source.read(&mut buf) {
                Ok(0) => {
                    self.exhausted = true;
                    return Err(Error::EndOfStream);
                }
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.rack = buf[0];
        self.mask = TOP_BIT;
        Ok(())
    }

    /// 读取单个位，返回 0 或 1
    pub fn read_bit(&mut self) -> Result<u8> {
        if self.closed {
            return Err(Error::ClosedStream);
        }
        if self.mask == 0 {
            self.refill()?;
        }
        let bit = u8::from(self.rack & self.mask != 0);
        self.mask >>= 1;
        Ok(bit)
    }

    /// 读取 `count` 位组成的无符号整数，先读到的位为最高位。
    ///
    /// 中途遇到流结束时整体失败，不返回部分值；此后读取器保持耗尽状态。
    pub fn read_bits(&mut self, count: u32) -> Result<u64> {
        if self.closed {
            return Err(Error::ClosedStream);
        }
        if count == 0 {
            return Ok(0);
        }
        check_width(count)?;
        let mut v = 0u64;
        for _ in 0..count {
            v = (v << 1) | u64::from(self.read_bit()?);
        }
        Ok(v)
    }

    /// 统计遇到 0 之前的 1 的个数
    pub fn read_unary(&mut self) -> Result<u64> {
        let mut q = 0u64;
        while self.read_bit()? == 1 {
            q += 1;
        }
        Ok(q)
    }

    /// 关闭读取器。持有的字节源被释放，借用的字节源保留给 `into_inner`。
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.ownership == Ownership::Owned {
            self.source = None;
        }
        tracing::trace!(ownership = ?self.ownership, "bit reader closed");
    }

    /// 取回底层字节源；当前字节中未读的位被丢弃
    pub fn into_inner(mut self) -> Result<R> {
        self.closed = true;
        self.source.take().ok_or(Error::ClosedStream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    /// 只接受前 `limit` 个字节的字节汇
    struct FailingSink {
        written: Vec<u8>,
        limit: usize,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written.len() >= self.limit {
                return Err(io::Error::new(io::ErrorKind::Other, "sink full"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// 第一次读取返回 Interrupted
    struct InterruptOnce {
        inner: Cursor<Vec<u8>>,
        interrupted: bool,
    }

    impl Read for InterruptOnce {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::Error::new(io::ErrorKind::Interrupted, "try again"));
            }
            self.inner.read(buf)
        }
    }

    #[test]
    fn test_bitwriter_reader_roundtrip() {
        let mut bw = BitWriter::in_memory();
        bw.write_bits(0b1010, 4).unwrap();
        bw.write_unary(3).unwrap();
        bw.write_bits(0b11, 2).unwrap();

        let bytes = bw.finish().unwrap();
        let mut br = BitReader::from_bytes(&bytes);

        assert_eq!(br.read_bits(4).unwrap(), 0b1010);
        assert_eq!(br.read_unary().unwrap(), 3);
        assert_eq!(br.read_bits(2).unwrap(), 0b11);
    }

    #[test]
    fn test_writer_pads_final_byte() {
        let mut out = Vec::new();
        let mut bw = BitWriter::new(&mut out);
        bw.write_bits(0b1011, 4).unwrap();
        bw.write_bits(0b0, 4).unwrap();
        bw.close().unwrap();
        drop(bw);
        assert_eq!(out, vec![0xB0]);

        let mut bw = BitWriter::in_memory();
        bw.write_bits(0b101, 3).unwrap();
        assert_eq!(bw.finish().unwrap(), vec![0b1010_0000]);
    }

    #[test]
    fn test_reader_reports_end_of_stream() {
        let data = [0xB0u8];
        let mut br = BitReader::from_bytes(&data);
        assert_eq!(br.read_bits(4).unwrap(), 11);
        assert_eq!(br.read_bits(4).unwrap(), 0);
        assert!(matches!(br.read_bits(1), Err(Error::EndOfStream)));
        assert!(matches!(br.read_bit(), Err(Error::EndOfStream)));
    }

    #[test]
    fn test_read_bits_fails_without_partial_value() {
        let data = [0xFFu8];
        let mut br = BitReader::from_bytes(&data);
        assert_eq!(br.read_bits(4).unwrap(), 0xF);
        assert!(matches!(br.read_bits(8), Err(Error::EndOfStream)));
    }

    #[test]
    fn test_writer_emits_each_full_byte_immediately() {
        let mut out = Vec::new();
        {
            let mut bw = BitWriter::new(&mut out);
            bw.write_bits(0xA5, 8).unwrap();
            bw.write_bit(true).unwrap();
            assert_eq!(bw.bits_written(), 9);
            let sink = bw.into_inner().unwrap();
            assert_eq!(sink.as_slice(), &[0xA5, 0x80]);
        }
        assert_eq!(out, vec![0xA5, 0x80]);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut out = Vec::new();
        let mut bw = BitWriter::new(&mut out);
        bw.write_bit(true).unwrap();
        bw.close().unwrap();
        bw.close().unwrap();
        drop(bw);
        assert_eq!(out, vec![0x80]);

        let data = [0u8];
        let mut br = BitReader::from_bytes(&data);
        br.close();
        br.close();
        assert!(br.is_closed());
    }

    #[test]
    fn test_operations_after_close_fail() {
        let mut bw = BitWriter::in_memory();
        bw.close().unwrap();
        assert!(matches!(bw.write_bit(true), Err(Error::ClosedStream)));
        assert!(matches!(bw.write_bits(1, 1), Err(Error::ClosedStream)));
        assert!(matches!(bw.flush(), Err(Error::ClosedStream)));

        let data = [0xFFu8];
        let mut br = BitReader::from_bytes(&data);
        br.close();
        assert!(matches!(br.read_bit(), Err(Error::ClosedStream)));
        assert!(matches!(br.read_bits(3), Err(Error::ClosedStream)));
    }

    #[test]
    fn test_zero_width_is_noop() {
        let mut bw = BitWriter::in_memory();
        bw.write_bits(0xFF, 0).unwrap();
        assert_eq!(bw.bits_written(), 0);
        assert!(bw.finish().unwrap().is_empty());

        let empty: [u8; 0] = [];
        let mut br = BitReader::from_bytes(&empty);
        assert_eq!(br.read_bits(0).unwrap(), 0);
    }

    #[test]
    fn test_width_above_64_rejected() {
        let mut bw = BitWriter::in_memory();
        assert!(matches!(bw.write_bits(0, 65), Err(Error::InvalidArgument(_))));
        let data = [0u8; 16];
        let mut br = BitReader::from_bytes(&data);
        assert!(matches!(br.read_bits(65), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_full_width_values() {
        let mut bw = BitWriter::in_memory();
        bw.write_bit(true).unwrap();
        bw.write_bits(u64::MAX, 64).unwrap();
        bw.write_bits(0x8000_0000_0000_0001, 64).unwrap();
        let bytes = bw.finish().unwrap();
        assert_eq!(bytes.len(), 17);

        let mut br = BitReader::from_bytes(&bytes);
        assert_eq!(br.read_bit().unwrap(), 1);
        assert_eq!(br.read_bits(64).unwrap(), u64::MAX);
        assert_eq!(br.read_bits(64).unwrap(), 0x8000_0000_0000_0001);
    }

    #[test]
    fn test_high_bits_above_width_ignored() {
        let mut bw = BitWriter::in_memory();
        bw.write_bits(0xFF0F, 8).unwrap();
        assert_eq!(bw.finish().unwrap(), vec![0x0F]);
    }

    #[test]
    fn test_failed_emit_keeps_state() {
        let sink = FailingSink { written: Vec::new(), limit: 0 };
        let mut bw = BitWriter::new(sink);
        bw.write_bits(0b1111111, 7).unwrap();
        assert!(matches!(bw.write_bit(true), Err(Error::Io(_))));
        assert_eq!(bw.bits_written(), 7);
        assert!(bw.close().is_err());
        assert!(bw.is_closed());
    }

    #[test]
    fn test_borrowed_reader_returns_source() {
        let mut cursor = Cursor::new(vec![0xC0u8, 0x7F]);
        {
            let mut br = BitReader::new(&mut cursor);
            assert_eq!(br.read_bits(2).unwrap(), 0b11);
            br.close();
            assert!(br.into_inner().is_ok());
        }
        // 借用的字节源在 close 后仍可使用
        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, vec![0x7F]);
    }

    #[test]
    fn test_owned_source_released_on_close() {
        let data = [0u8];
        let mut br = BitReader::from_bytes(&data);
        assert_eq!(br.ownership(), Ownership::Owned);
        br.close();
        assert!(matches!(br.into_inner(), Err(Error::ClosedStream)));
    }

    #[test]
    fn test_interrupted_read_is_retried() {
        let source = InterruptOnce {
            inner: Cursor::new(vec![0x40]),
            interrupted: false,
        };
        let mut br = BitReader::new(source);
        assert_eq!(br.read_bits(2).unwrap(), 0b01);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bits.bin");

        let mut bw = BitWriter::create(&path).unwrap();
        bw.write_bits(0b1011, 4).unwrap();
        bw.write_bits(300, 9).unwrap();
        bw.close().unwrap();
        drop(bw);

        assert_eq!(std::fs::read(&path).unwrap().len(), 2);

        let mut br = BitReader::open(&path).unwrap();
        assert_eq!(br.read_bits(4).unwrap(), 0b1011);
        assert_eq!(br.read_bits(9).unwrap(), 300);
        assert_eq!(br.read_bits(3).unwrap(), 0);
        assert!(matches!(br.read_bit(), Err(Error::EndOfStream)));
        br.close();
    }

    #[test]
    fn test_drop_flushes_partial_byte() {
        let mut out = Vec::new();
        {
            let mut bw = BitWriter::new(&mut out);
            bw.write_bits(0b11, 2).unwrap();
        }
        assert_eq!(out, vec![0xC0]);
    }
}
