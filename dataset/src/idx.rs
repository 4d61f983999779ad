//! Reader for the IDX files the MNIST database is distributed in.
//!
//! Every file starts with a big-endian `u32` magic number followed by big-endian `u32`
//! dimensions, then the raw `u8` payload.

use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
};

use log::debug;
use ndarray::Array2;

use crate::{DataErr, Result};

pub const IMAGE_MAGIC: u32 = 2051;
pub const LABEL_MAGIC: u32 = 2049;

/// Reads an image file.
///
/// # Returns
/// A `count x (rows * cols)` matrix, one flattened image per row with pixels scaled to `[0, 1]`.
pub fn read_images<R: Read>(mut reader: R) -> Result<Array2<f64>> {
    expect_magic(&mut reader, IMAGE_MAGIC)?;
    let count = read_dim(&mut reader)?;
    let rows = read_dim(&mut reader)?;
    let cols = read_dim(&mut reader)?;
    debug!("reading {count} images of {rows}x{cols}");

    let oversized = || DataErr::Truncated {
        what: "image pixels",
        got: 0,
        expected: usize::MAX,
    };
    let pixels = rows.checked_mul(cols).ok_or_else(oversized)?;
    let len = count.checked_mul(pixels).ok_or_else(oversized)?;

    let payload = read_payload(reader, "image pixels", len)?;
    let data = payload.into_iter().map(|p| p as f64 / 255.).collect();

    Array2::from_shape_vec((count, pixels), data).map_err(|_| DataErr::Truncated {
        what: "image pixels",
        got: 0,
        expected: len,
    })
}

/// Reads a label file, one class id per sample.
pub fn read_labels<R: Read>(mut reader: R) -> Result<Vec<u8>> {
    expect_magic(&mut reader, LABEL_MAGIC)?;
    let count = read_dim(&mut reader)?;
    debug!("reading {count} labels");

    read_payload(reader, "labels", count)
}

pub fn load_images<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    read_images(open(path.as_ref())?)
}

pub fn load_labels<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    read_labels(open(path.as_ref())?)
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path)
        .map_err(|e| io::Error::new(e.kind(), format!("{}: {e}", path.display())))?;
    Ok(BufReader::new(file))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0; 4];
    reader.read_exact(&mut buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => DataErr::Truncated {
            what: "header",
            got: 0,
            expected: buf.len(),
        },
        _ => DataErr::Io(e),
    })?;
    Ok(u32::from_be_bytes(buf))
}

fn read_dim<R: Read>(reader: &mut R) -> Result<usize> {
    Ok(read_u32(reader)? as usize)
}

fn expect_magic<R: Read>(reader: &mut R, expected: u32) -> Result<()> {
    let got = read_u32(reader)?;
    if got != expected {
        return Err(DataErr::BadMagic { expected, got });
    }
    Ok(())
}

/// Reads exactly `len` bytes without trusting `len` for the allocation.
fn read_payload<R: Read>(reader: R, what: &'static str, len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.take(len as u64).read_to_end(&mut buf)?;

    if buf.len() != len {
        return Err(DataErr::Truncated {
            what,
            got: buf.len(),
            expected: len,
        });
    }
    Ok(buf)
}
