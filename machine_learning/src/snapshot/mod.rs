//! Binary parameter snapshots.
//!
//! A snapshot is a plain sequence of records, each one an 8 byte tag derived from the field name
//! followed by its payload. Every number is written in native byte order, matrices as a pair of
//! `i32` dimensions followed by their entries in column-major order.

mod codec;
mod record;
mod tag;

use std::{fs, io, path::Path};

pub use codec::{Cursor, SnapshotReader, SnapshotWriter};
pub use record::Record;
pub use tag::tag;

use crate::Result;

/// Writes `bytes` to `path`, truncating any previous content.
pub fn write_file<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, bytes).map_err(|e| with_path(e, path))?;
    log::debug!("wrote a {} byte snapshot to {}", bytes.len(), path.display());
    Ok(())
}

/// Reads the whole file at `path`.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| with_path(e, path))?;
    log::debug!("read a {} byte snapshot from {}", bytes.len(), path.display());
    Ok(bytes)
}

fn with_path(e: io::Error, path: &Path) -> io::Error {
    io::Error::new(e.kind(), format!("{}: {e}", path.display()))
}
