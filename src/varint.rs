use std::io::{ErrorKind, Read, Write};

use crate::error::{Error, Result};

/// 写入 LEB128 风格的无符号 varint，返回写入的字节数
pub fn write_varint<W: Write>(writer: &mut W, mut value: u64) -> Result<usize> {
    let mut buf = [0u8; 10];
    let mut n = 0;
    loop {
        let low = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf[n] = low;
            n += 1;
            break;
        }
        buf[n] = low | 0x80;
        n += 1;
    }
    writer.write_all(&buf[..n])?;
    Ok(n)
}

/// 读取 LEB128 风格的无符号 varint
pub fn read_varint<R: Read>(reader: &mut R) -> Result<u64> {
    let mut shift = 0u32;
    let mut result = 0u64;
    loop {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => Error::Format("truncated varint".into()),
            _ => Error::Io(e),
        })?;
        let b = byte[0];
        if shift == 63 && b > 1 {
            return Err(Error::Format("varint overflows u64".into()));
        }
        result |= ((b & 0x7F) as u64) << shift;
        if b & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift > 63 {
            return Err(Error::Format("varint too long".into()));
        }
    }
}

/// 读取 varint 并转换为 usize
pub fn read_varint_usize<R: Read>(reader: &mut R) -> Result<usize> {
    let v = read_varint(reader)?;
    usize::try_from(v).map_err(|_| Error::Format(format!("length {} exceeds usize", v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_varint_roundtrip() {
        let test_values = vec![0, 127, 128, 255, 256, 16384, 1_000_000, u64::MAX];

        for &val in &test_values {
            let mut buf = Vec::new();
            let n = write_varint(&mut buf, val).unwrap();
            assert_eq!(n, buf.len());
            let mut cursor = Cursor::new(buf);
            assert_eq!(read_varint(&mut cursor).unwrap(), val);
        }
    }

    #[test]
    fn test_varint_truncated() {
        let mut cursor = Cursor::new(vec![0x80u8, 0x80]);
        assert!(matches!(read_varint(&mut cursor), Err(Error::Format(_))));
    }

    #[test]
    fn test_varint_too_long() {
        let mut cursor = Cursor::new(vec![0xFFu8; 11]);
        assert!(matches!(read_varint(&mut cursor), Err(Error::Format(_))));
    }
}
