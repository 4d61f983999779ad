use ndarray::{Array2, ShapeBuilder};

use super::codec::Cursor;
use crate::{MlErr, Result};

/// A value that can be stored as the payload of a snapshot record.
pub trait Record: Sized {
    /// Appends the payload to `buf`.
    fn write(&self, buf: &mut Vec<u8>) -> Result<()>;

    /// Reads the payload of the record named `field` from `cursor`.
    fn read(field: &'static str, cursor: &mut Cursor<'_>) -> Result<Self>;
}

impl Record for i32 {
    fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(bytemuck::bytes_of(self));
        Ok(())
    }

    fn read(field: &'static str, cursor: &mut Cursor<'_>) -> Result<Self> {
        let bytes = cursor.take(field, size_of::<i32>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }
}

impl Record for f64 {
    fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(bytemuck::bytes_of(self));
        Ok(())
    }

    fn read(field: &'static str, cursor: &mut Cursor<'_>) -> Result<Self> {
        let bytes = cursor.take(field, size_of::<f64>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }
}

impl Record for Array2<f64> {
    fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        let (rows, cols) = self.dim();
        for dim in [rows, cols] {
            let dim = i32::try_from(dim).map_err(|_| MlErr::InvalidParameter {
                what: "matrix dimension",
                value: dim as f64,
            })?;
            dim.write(buf)?;
        }

        buf.reserve(rows * cols * size_of::<f64>());
        for v in self.t().iter() {
            buf.extend_from_slice(bytemuck::bytes_of(v));
        }
        Ok(())
    }

    fn read(field: &'static str, cursor: &mut Cursor<'_>) -> Result<Self> {
        let rows = i32::read(field, cursor)?;
        let cols = i32::read(field, cursor)?;
        let (Ok(rows), Ok(cols)) = (usize::try_from(rows), usize::try_from(cols)) else {
            return Err(MlErr::corrupt(
                field,
                format!("negative matrix dimensions {rows}x{cols}"),
            ));
        };

        let len = rows
            .checked_mul(cols)
            .and_then(|n| n.checked_mul(size_of::<f64>()))
            .ok_or_else(|| MlErr::corrupt(field, format!("matrix {rows}x{cols} is too large")))?;

        let data: Vec<f64> = cursor
            .take(field, len)?
            .chunks_exact(size_of::<f64>())
            .map(bytemuck::pod_read_unaligned)
            .collect();

        let mat = Array2::from_shape_vec((rows, cols).f(), data)
            .map_err(|e| MlErr::corrupt(field, e.to_string()))?;

        Ok(mat.as_standard_layout().into_owned())
    }
}
