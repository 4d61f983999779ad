use super::{record::Record, tag::tag};
use crate::{MlErr, Result};

/// Builds a snapshot one record at a time.
#[derive(Debug, Default)]
pub struct SnapshotWriter {
    buf: Vec<u8>,
}

impl SnapshotWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the record for `name`.
    pub fn field<R: Record>(&mut self, name: &'static str, value: &R) -> Result<&mut Self> {
        self.buf.extend_from_slice(&tag(name).to_ne_bytes());
        value.write(&mut self.buf)?;
        Ok(self)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// A read position over a snapshot buffer.
#[derive(Debug)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Takes the next `n` bytes.
    ///
    /// # Returns
    /// A `CorruptSnapshot` naming `field` if fewer than `n` bytes are left.
    pub fn take(&mut self, field: &'static str, n: usize) -> Result<&'a [u8]> {
        let left = self.buf.len() - self.pos;
        if n > left {
            return Err(MlErr::corrupt(
                field,
                format!("truncated, needed {n} bytes but only {left} are left"),
            ));
        }

        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }
}

/// Reads a snapshot back in the order it was written.
#[derive(Debug)]
pub struct SnapshotReader<'a> {
    cursor: Cursor<'a>,
}

impl<'a> SnapshotReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            cursor: Cursor { buf, pos: 0 },
        }
    }

    /// Reads the record for `name`, which has to be the next one in the buffer.
    pub fn field<R: Record>(&mut self, name: &'static str) -> Result<R> {
        let bytes = self.cursor.take(name, size_of::<u64>())?;
        let got: u64 = bytemuck::pod_read_unaligned(bytes);

        let expected = tag(name);
        if got != expected {
            return Err(MlErr::corrupt(
                name,
                format!("found tag {got:#018x}, expected {expected:#018x}"),
            ));
        }

        R::read(name, &mut self.cursor)
    }

    /// The amount of bytes not consumed yet.
    pub fn remaining(&self) -> usize {
        self.cursor.buf.len() - self.cursor.pos
    }
}
