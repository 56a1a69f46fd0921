//! Python 绑定（`python` feature）

use numpy::{PyArray1, PyReadonlyArrayDyn};
use pyo3::exceptions::{PyEOFError, PyIndexError, PyOSError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict};

use crate::bitstream::{BitReader, BitWriter};
use crate::config::CodecOptions;
use crate::error::Error;
use crate::jagged::JaggedView;
use crate::offsets::{self, Validation};

impl From<Error> for PyErr {
    fn from(e: Error) -> PyErr {
        let msg = e.to_string();
        match e {
            Error::InvalidArgument(_)
            | Error::DecreasingOffsets { .. }
            | Error::ClosedStream
            | Error::Format(_) => PyValueError::new_err(msg),
            Error::OutOfBounds { .. } => PyIndexError::new_err(msg),
            Error::EndOfStream => PyEOFError::new_err(msg),
            Error::Unsupported(_) => PyRuntimeError::new_err(msg),
            Error::Io(_) => PyOSError::new_err(msg),
        }
    }
}

/// 压缩偏移数组，返回 int64 数组
#[pyfunction]
#[pyo3(signature = (fromoffsets, length, permissive=false))]
pub fn compact_offsets<'py>(
    py: Python<'py>,
    fromoffsets: PyReadonlyArrayDyn<'py, i64>,
    length: i64,
    permissive: bool,
) -> PyResult<Bound<'py, PyArray1<i64>>> {
    if length < 0 {
        return Err(Error::InvalidArgument(format!("length must be >= 0, got {}", length)).into());
    }
    let from = fromoffsets.as_slice()?;
    let validation = if permissive {
        Validation::Permissive
    } else {
        Validation::Strict
    };
    let out = py.allow_threads(|| offsets::compact_offsets_with(from, length as usize, validation))?;
    Ok(PyArray1::from_vec(py, out))
}

/// 压缩不规则数组到 JAGZ 字节流
#[pyfunction]
#[pyo3(signature = (
    offsets,
    values,
    target_block_len=131072,
    block_xz=false,
    block_xz_level=9,
    block_xz_min_bytes=4096,
    block_xz_min_ratio=0.99
))]
pub fn compress_jagged<'py>(
    py: Python<'py>,
    offsets: PyReadonlyArrayDyn<'py, i64>,
    values: PyReadonlyArrayDyn<'py, i64>,
    target_block_len: usize,
    block_xz: bool,
    block_xz_level: i32,
    block_xz_min_bytes: usize,
    block_xz_min_ratio: f64,
) -> PyResult<Bound<'py, PyBytes>> {
    let offsets = offsets.as_slice()?;
    let values = values.as_slice()?;
    let options = CodecOptions {
        target_block_len,
        block_xz,
        block_xz_level,
        block_xz_min_bytes,
        block_xz_min_ratio,
    };

    // 重计算部分释放 GIL
    let bytes = py.allow_threads(|| {
        crate::compress::compress_jagged(JaggedView::new(offsets, values), &options)
    })?;
    Ok(PyBytes::new(py, &bytes))
}

/// 解压缩 JAGZ 字节流，返回 {"offsets", "values"}
#[pyfunction]
pub fn decompress_jagged<'py>(py: Python<'py>, blob: &[u8]) -> PyResult<Bound<'py, PyDict>> {
    let arr = py.allow_threads(|| crate::decompress::decompress_jagged(blob))?;
    let result = PyDict::new(py);
    result.set_item("offsets", PyArray1::from_vec(py, arr.offsets))?;
    result.set_item("values", PyArray1::from_vec(py, arr.values))?;
    Ok(result)
}

/// 按给定位宽依次写入；位宽 <= 0 的项被跳过
#[pyfunction]
pub fn pack_bits<'py>(
    py: Python<'py>,
    values: Vec<u64>,
    widths: Vec<i64>,
) -> PyResult<Bound<'py, PyBytes>> {
    if values.len() != widths.len() {
        return Err(PyValueError::new_err("values and widths differ in length"));
    }
    let mut bw = BitWriter::in_memory();
    for (&v, &w) in values.iter().zip(&widths) {
        if w > 0 {
            let w = u32::try_from(w).map_err(|_| Error::InvalidArgument(format!("bit width {}", w)))?;
            bw.write_bits(v, w)?;
        }
    }
    let bytes = bw.finish()?;
    Ok(PyBytes::new(py, &bytes))
}

/// 按给定位宽依次读取；位宽 <= 0 时得到 0
#[pyfunction]
pub fn unpack_bits(blob: &[u8], widths: Vec<i64>) -> PyResult<Vec<u64>> {
    let mut br = BitReader::from_bytes(blob);
    let mut out = Vec::with_capacity(widths.len());
    for w in widths {
        let v = if w > 0 {
            let w = u32::try_from(w).map_err(|_| Error::InvalidArgument(format!("bit width {}", w)))?;
            br.read_bits(w)?
        } else {
            0
        };
        out.push(v);
    }
    br.close();
    Ok(out)
}

#[pymodule]
fn _jagz(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(compact_offsets, m)?)?;
    m.add_function(wrap_pyfunction!(compress_jagged, m)?)?;
    m.add_function(wrap_pyfunction!(decompress_jagged, m)?)?;
    m.add_function(wrap_pyfunction!(pack_bits, m)?)?;
    m.add_function(wrap_pyfunction!(unpack_bits, m)?)?;
    Ok(())
}
