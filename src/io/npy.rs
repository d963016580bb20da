//! Minimal NumPy `.npy` reader/writer for the per-polygon vector files.
//!
//! Supports exactly what the dataset needs: little-endian 1-D arrays of
//! `u8`, `u16`, `u32` or `i32`, format version 1.0 (2.0 headers are
//! accepted when reading). The writer is shared between the offline dataset
//! compiler and the test fixtures.

use crate::error::TzGridError;
use std::fs;
use std::path::Path;

const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// A vector of zone ids with the storage width chosen at dataset build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UintVector {
    U8(Vec<u8>),
    U16(Vec<u16>),
}

impl UintVector {
    pub fn len(&self) -> usize {
        match self {
            UintVector::U8(values) => values.len(),
            UintVector::U16(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the value at `idx` widened to `u16`.
    pub fn get(&self, idx: usize) -> Option<u16> {
        match self {
            UintVector::U8(values) => values.get(idx).map(|&v| u16::from(v)),
            UintVector::U16(values) => values.get(idx).copied(),
        }
    }
}

fn load_error(path: &Path, reason: impl Into<String>) -> TzGridError {
    TzGridError::Load {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn quoted_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let rest = &header[header.find(key)? + key.len()..];
    let rest = rest[rest.find(':')? + 1..].trim_start();
    let rest = rest.strip_prefix('\'')?;
    Some(&rest[..rest.find('\'')?])
}

fn shape_value(header: &str) -> Option<&str> {
    let rest = &header[header.find("'shape'")? + "'shape'".len()..];
    let rest = rest[rest.find('(')? + 1..].trim_start();
    Some(&rest[..rest.find(')')?])
}

/// Parses the header, returning `(descr, element count, data offset)`.
fn parse_header(bytes: &[u8]) -> Result<(String, usize, usize), String> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err("not a .npy file (bad magic)".to_string());
    }
    let (header_len, header_start) = match bytes[6] {
        1 => (usize::from(u16::from_le_bytes([bytes[8], bytes[9]])), 10),
        2 => {
            if bytes.len() < 12 {
                return Err("truncated .npy header".to_string());
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (len as usize, 12)
        }
        version => return Err(format!("unsupported .npy format version {}", version)),
    };
    let data_offset = header_start + header_len;
    if bytes.len() < data_offset {
        return Err("truncated .npy header".to_string());
    }
    let header = std::str::from_utf8(&bytes[header_start..data_offset])
        .map_err(|_| "non-ASCII .npy header".to_string())?;

    let descr = quoted_value(header, "'descr'").ok_or("missing 'descr' in .npy header")?;
    if !header.contains("'fortran_order': False") {
        return Err("fortran-order arrays are not supported".to_string());
    }
    let shape = shape_value(header).ok_or("missing 'shape' in .npy header")?;
    let dims: Vec<&str> = shape
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .collect();
    if dims.len() != 1 {
        return Err(format!("expected a 1-D array, got shape ({})", shape));
    }
    let count: usize = dims[0]
        .parse()
        .map_err(|_| format!("invalid shape ({})", shape))?;

    Ok((descr.to_string(), count, data_offset))
}

/// Reads the raw payload, checking the dtype against `expected_descrs`.
fn read_payload(path: &Path, expected_descrs: &[&str]) -> Result<(String, Vec<u8>, usize), TzGridError> {
    let bytes = fs::read(path).map_err(|e| load_error(path, e.to_string()))?;
    let (descr, count, data_offset) = parse_header(&bytes).map_err(|r| load_error(path, r))?;
    if !expected_descrs.contains(&descr.as_str()) {
        return Err(load_error(
            path,
            format!("unexpected dtype '{}' (expected one of {:?})", descr, expected_descrs),
        ));
    }
    let item_size = match descr.as_str() {
        "|u1" | "<u1" => 1,
        "<u2" => 2,
        "<u4" | "<i4" => 4,
        other => return Err(load_error(path, format!("unsupported dtype '{}'", other))),
    };
    let data = &bytes[data_offset..];
    if data.len() != count * item_size {
        return Err(load_error(
            path,
            format!(
                "payload size mismatch: {} bytes for {} elements of {} bytes",
                data.len(),
                count,
                item_size
            ),
        ));
    }
    Ok((descr, data.to_vec(), count))
}

/// Reads a 1-D `<i4` array.
pub fn read_i32(path: &Path) -> Result<Vec<i32>, TzGridError> {
    let (_, data, count) = read_payload(path, &["<i4"])?;
    let mut values = Vec::with_capacity(count);
    for chunk in data.chunks_exact(4) {
        values.push(i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(values)
}

/// Reads a 1-D `<u4` array.
pub fn read_u32(path: &Path) -> Result<Vec<u32>, TzGridError> {
    let (_, data, count) = read_payload(path, &["<u4"])?;
    let mut values = Vec::with_capacity(count);
    for chunk in data.chunks_exact(4) {
        values.push(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(values)
}

/// Reads a 1-D `u1` or `<u2` array, preserving the stored width.
pub fn read_uint_vector(path: &Path) -> Result<UintVector, TzGridError> {
    let (descr, data, count) = read_payload(path, &["|u1", "<u1", "<u2"])?;
    if descr == "<u2" {
        let mut values = Vec::with_capacity(count);
        for chunk in data.chunks_exact(2) {
            values.push(u16::from_le_bytes([chunk[0], chunk[1]]));
        }
        Ok(UintVector::U16(values))
    } else {
        Ok(UintVector::U8(data))
    }
}

fn write_array(path: &Path, descr: &str, count: usize, data: &[u8]) -> Result<(), TzGridError> {
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': ({},), }}",
        descr, count
    );
    // pad the header so the payload starts 64-byte aligned
    let unpadded = 10 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    let mut out = Vec::with_capacity(10 + header.len() + data.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(data);
    fs::write(path, out).map_err(|e| load_error(path, e.to_string()))
}

/// Writes a 1-D `<i4` array.
pub fn write_i32(path: &Path, values: &[i32]) -> Result<(), TzGridError> {
    let mut data = Vec::with_capacity(values.len() * 4);
    for value in values {
        data.extend_from_slice(&value.to_le_bytes());
    }
    write_array(path, "<i4", values.len(), &data)
}

/// Writes a 1-D `<u4` array.
pub fn write_u32(path: &Path, values: &[u32]) -> Result<(), TzGridError> {
    let mut data = Vec::with_capacity(values.len() * 4);
    for value in values {
        data.extend_from_slice(&value.to_le_bytes());
    }
    write_array(path, "<u4", values.len(), &data)
}

/// Writes a 1-D `|u1` array.
pub fn write_u8(path: &Path, values: &[u8]) -> Result<(), TzGridError> {
    write_array(path, "|u1", values.len(), values)
}

/// Writes a 1-D `<u2` array.
pub fn write_u16(path: &Path, values: &[u16]) -> Result<(), TzGridError> {
    let mut data = Vec::with_capacity(values.len() * 2);
    for value in values {
        data.extend_from_slice(&value.to_le_bytes());
    }
    write_array(path, "<u2", values.len(), &data)
}
