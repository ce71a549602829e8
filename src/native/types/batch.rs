//! Row-batch buffers shared by columns and parameters.
//!
//! A `BatchBuffer` holds `rows` fixed-size elements in one contiguous byte
//! buffer, with a parallel null-indicator array and an optional
//! returned-length array. Columns allocate one row per fetch-batch slot;
//! parameters allocate a single row.

use super::value::OracleValue;
use super::value_kind::{Layout, ValueKind};
use crate::error::{Error, Result};
use crate::native::constants::{DATE_SIZE, INDICATOR_NULL, INDICATOR_PRESENT};
use crate::native::decode::{
    decode_oracle_date, decode_text, decode_varnum, encode_oracle_date, encode_text, encode_varnum,
};
use crate::native::{BindTarget, DefineTarget, Handle};
use chrono::NaiveDateTime;
use std::mem::size_of;

/// Contiguous element buffer plus indicators and lengths.
#[derive(Debug)]
pub struct BatchBuffer {
    layout: Layout,
    rows: usize,
    data: Vec<u8>,
    indicators: Vec<i16>,
    lengths: Option<Vec<u16>>,
}

fn try_filled<T: Clone>(len: usize, fill: T) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| Error::no_memory(len.saturating_mul(size_of::<T>())))?;
    buf.resize(len, fill);
    Ok(buf)
}

impl BatchBuffer {
    /// Allocate a zeroed buffer with every row marked NULL.
    pub fn allocate(layout: Layout, rows: usize, with_lengths: bool) -> Result<Self> {
        let bytes = layout
            .element_size
            .checked_mul(rows)
            .ok_or_else(|| Error::no_memory(usize::MAX))?;
        let data = try_filled(bytes, 0u8)?;
        let indicators = try_filled(rows, INDICATOR_NULL)?;
        let lengths = if with_lengths {
            Some(try_filled(rows, 0u16)?)
        } else {
            None
        };
        Ok(Self {
            layout,
            rows,
            data,
            indicators,
            lengths,
        })
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn element_size(&self) -> usize {
        self.layout.element_size
    }

    /// True once [`release`](Self::release) has run.
    pub fn is_released(&self) -> bool {
        self.rows == 0
    }

    pub fn is_null(&self, row: usize) -> bool {
        self.indicators.get(row).map_or(true, |&ind| ind == INDICATOR_NULL)
    }

    /// Raw bytes of one row.
    pub fn element(&self, row: usize) -> Option<&[u8]> {
        let size = self.layout.element_size;
        let start = row.checked_mul(size)?;
        self.data.get(start..start.checked_add(size)?)
    }

    pub fn element_mut(&mut self, row: usize) -> Option<&mut [u8]> {
        let size = self.layout.element_size;
        let start = row.checked_mul(size)?;
        self.data.get_mut(start..start.checked_add(size)?)
    }

    /// Returned or assigned length of one row, when lengths are tracked.
    pub fn length(&self, row: usize) -> Option<u16> {
        self.lengths.as_ref()?.get(row).copied()
    }

    pub fn set_null(&mut self, row: usize) {
        if let Some(ind) = self.indicators.get_mut(row) {
            *ind = INDICATOR_NULL;
        }
    }

    /// Mark a row present with the given length.
    pub fn set_present(&mut self, row: usize, length: u16) {
        if let Some(ind) = self.indicators.get_mut(row) {
            *ind = INDICATOR_PRESENT;
        }
        if let Some(len) = self.lengths.as_mut().and_then(|l| l.get_mut(row)) {
            *len = length;
        }
    }

    /// Lend every row to a fetch.
    pub fn define_target(&mut self, define: Handle) -> DefineTarget<'_> {
        DefineTarget {
            define,
            wire: self.layout.wire,
            element_size: self.layout.element_size,
            data: &mut self.data,
            indicators: &mut self.indicators,
            lengths: self.lengths.as_deref_mut(),
        }
    }

    /// Lend row 0 to an execute.
    pub fn bind_target(&mut self, bind: Handle, nested: Option<Handle>) -> Result<BindTarget<'_>> {
        let size = self.layout.element_size;
        let wire = self.layout.wire;
        let data = self
            .data
            .get_mut(..size)
            .ok_or_else(|| Error::internal("bind buffer released"))?;
        let indicator = self
            .indicators
            .first_mut()
            .ok_or_else(|| Error::internal("bind buffer released"))?;
        let length = self
            .lengths
            .as_mut()
            .and_then(|l| l.first_mut())
            .ok_or_else(|| Error::internal("bind buffer has no length slot"))?;
        Ok(BindTarget {
            bind,
            wire,
            data,
            indicator,
            length,
            nested,
        })
    }

    /// Bytes of a present row of the expected kind.
    fn present(&self, row: usize, name: &str, kind: ValueKind, requested: &'static str) -> Result<&[u8]> {
        if self.layout.kind != kind {
            return Err(Error::bad_output(name, self.layout.kind, requested));
        }
        if self.is_null(row) {
            return Err(Error::null_output(name, kind, requested));
        }
        self.element(row)
            .ok_or_else(|| Error::internal(format!("row {} is outside the buffer of {}", row, name)))
    }

    pub fn read_text(&self, row: usize, name: &str) -> Result<String> {
        let slot = self.present(row, name, ValueKind::Text, "text")?;
        decode_text(slot, self.length(row).map(usize::from))
    }

    /// Exact decimal string of a Number row.
    pub fn read_decimal(&self, row: usize, name: &str) -> Result<String> {
        decode_varnum(self.present(row, name, ValueKind::Number, "number")?)
    }

    pub fn read_date(&self, row: usize, name: &str) -> Result<NaiveDateTime> {
        let slot = self.present(row, name, ValueKind::Date, "date")?;
        decode_oracle_date(&slot[..DATE_SIZE.min(slot.len())])
    }

    /// Decode a row according to its kind.
    pub fn read_value(&self, row: usize, name: &str) -> Result<OracleValue> {
        if self.is_null(row) {
            return Ok(OracleValue::Null);
        }
        match self.layout.kind {
            ValueKind::Number => self.read_decimal(row, name).map(OracleValue::Number),
            ValueKind::Date => self.read_date(row, name).map(OracleValue::Date),
            ValueKind::Text => self.read_text(row, name).map(OracleValue::Text),
            kind => Err(Error::bad_output(name, kind, "value")),
        }
    }

    fn writable(&mut self, row: usize, name: &str, kind: ValueKind, supplied: &'static str) -> Result<&mut [u8]> {
        if self.layout.kind != kind {
            return Err(Error::bad_input(name, self.layout.kind, supplied));
        }
        self.element_mut(row)
            .ok_or_else(|| Error::internal(format!("row {} is outside the buffer of {}", row, name)))
    }

    /// Store text, truncated to the slot capacity. The length counts the terminator.
    pub fn write_text(&mut self, row: usize, name: &str, value: &str) -> Result<()> {
        let slot = self.writable(row, name, ValueKind::Text, "text")?;
        let written = encode_text(value, slot);
        self.set_present(row, (written + 1) as u16);
        Ok(())
    }

    /// Store a decimal literal as a Number.
    pub fn write_decimal(&mut self, row: usize, name: &str, value: &str) -> Result<()> {
        let slot = self.writable(row, name, ValueKind::Number, "number")?;
        encode_varnum(value, slot)?;
        let size = slot.len() as u16;
        self.set_present(row, size);
        Ok(())
    }

    pub fn write_date(&mut self, row: usize, name: &str, value: &NaiveDateTime) -> Result<()> {
        let slot = self.writable(row, name, ValueKind::Date, "date")?;
        let bytes = encode_oracle_date(value)?;
        slot[..DATE_SIZE].copy_from_slice(&bytes);
        self.set_present(row, DATE_SIZE as u16);
        Ok(())
    }

    /// Free the storage. Safe to call more than once.
    pub fn release(&mut self) {
        self.rows = 0;
        self.data = Vec::new();
        self.indicators = Vec::new();
        self.lengths = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::types::ValueKind;

    fn text_layout(chars: usize) -> Layout {
        Layout::for_kind(ValueKind::Text, chars).unwrap()
    }

    #[test]
    fn test_allocate_starts_null() {
        let buf = BatchBuffer::allocate(text_layout(9), 4, true).unwrap();
        assert_eq!(buf.rows(), 4);
        assert_eq!(buf.element_size(), 10);
        for row in 0..4 {
            assert!(buf.is_null(row));
            assert_eq!(buf.element(row).unwrap(), &[0u8; 10]);
            assert_eq!(buf.length(row), Some(0));
        }
        assert!(buf.element(4).is_none());
    }

    #[test]
    fn test_rows_are_disjoint() {
        let mut buf = BatchBuffer::allocate(text_layout(3), 3, true).unwrap();
        buf.element_mut(1).unwrap().copy_from_slice(b"abc\0");
        buf.set_present(1, 3);
        assert!(buf.is_null(0));
        assert!(!buf.is_null(1));
        assert_eq!(buf.element(1).unwrap(), b"abc\0");
        assert_eq!(buf.element(0).unwrap(), &[0u8; 4]);
        assert_eq!(buf.length(1), Some(3));
        buf.set_null(1);
        assert!(buf.is_null(1));
    }

    #[test]
    fn test_define_target_spans_batch() {
        let layout = Layout::for_kind(ValueKind::Number, 0).unwrap();
        let mut buf = BatchBuffer::allocate(layout, 5, false).unwrap();
        let target = buf.define_target(Handle::new(crate::native::HandleType::Define, 1));
        assert_eq!(target.data.len(), 22 * 5);
        assert_eq!(target.indicators.len(), 5);
        assert!(target.lengths.is_none());
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut buf = BatchBuffer::allocate(text_layout(5), 2, true).unwrap();
        buf.release();
        buf.release();
        assert!(buf.is_released());
        assert!(buf.is_null(0));
        assert!(buf.element(0).is_none());
        assert!(buf
            .bind_target(Handle::new(crate::native::HandleType::Bind, 1), None)
            .is_err());
    }

    #[test]
    fn test_typed_access_checks_kind() {
        let mut buf = BatchBuffer::allocate(text_layout(8), 1, true).unwrap();
        assert!(matches!(
            buf.write_decimal(0, ":sName", "1"),
            Err(Error::BadInputType { .. })
        ));
        assert!(matches!(
            buf.read_text(0, ":sName"),
            Err(Error::BadOutputType { is_null: true, .. })
        ));
        buf.write_text(0, ":sName", "hello").unwrap();
        assert_eq!(buf.length(0), Some(6));
        assert_eq!(buf.read_text(0, ":sName").unwrap(), "hello");
        assert_eq!(buf.read_value(0, ":sName").unwrap(), OracleValue::from("hello"));
        assert!(matches!(
            buf.read_decimal(0, ":sName"),
            Err(Error::BadOutputType { is_null: false, .. })
        ));
    }

    #[test]
    fn test_oversized_allocation_fails() {
        let layout = text_layout(usize::MAX / 4);
        assert!(matches!(
            BatchBuffer::allocate(layout, 8, false),
            Err(Error::NoMemory { .. })
        ));
    }
}
