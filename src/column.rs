//! Output columns of a result set.
//!
//! A [`Column`] owns the batch buffers for one select-list position. The
//! native layer writes a whole batch into them on every fetch; reads decode
//! the row the owning result set is positioned on.

use crate::error::{Error, Result};
use crate::native::constants::AL32UTF8_CHARSET_ID;
use crate::native::decode::{decimal_to_f64, decimal_to_i64};
use crate::native::types::{resolve_native, BatchBuffer, ColumnDescription, OracleValue, ValueKind};
use crate::native::{native_error, Attribute, CallInterface, DefineTarget, Handle};
use chrono::NaiveDateTime;
use std::fmt;

/// One output position of a result set.
pub struct Column {
    name: String,
    position: usize,
    type_code: u16,
    max_size: u32,
    buffer: BatchBuffer,
    define: Option<Handle>,
}

impl Column {
    /// Resolve the layout of a described column and allocate `fetch_size` rows.
    pub(crate) fn new(description: &ColumnDescription, fetch_size: u32) -> Result<Self> {
        let layout = resolve_native(&description.name, description.type_code, description.max_size)?;
        let buffer = BatchBuffer::allocate(layout, fetch_size as usize, layout.has_lengths())?;
        Ok(Self {
            name: description.name.clone(),
            position: description.position,
            type_code: description.type_code,
            max_size: description.max_size,
            buffer,
            define: None,
        })
    }

    /// Column name, exact case.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 1-based position in the select list.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn kind(&self) -> ValueKind {
        self.buffer.layout().kind
    }

    /// Native type code reported by describe.
    pub fn type_code(&self) -> u16 {
        self.type_code
    }

    /// Maximum size in bytes reported by describe.
    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    /// Bytes per row in the fetch buffer.
    pub fn element_size(&self) -> usize {
        self.buffer.element_size()
    }

    pub(crate) fn is_defined(&self) -> bool {
        self.define.is_some()
    }

    /// Register the buffer layout with the native statement.
    pub(crate) fn define(&mut self, ci: &dyn CallInterface, stmt: Handle, err: Handle) -> Result<()> {
        let layout = self.buffer.layout();
        let define = ci
            .define_by_pos(stmt, err, self.position as u32, layout.wire, layout.element_size)
            .map_err(|status| native_error(ci, err, status).with_context(&self.name))?;
        if layout.kind == ValueKind::Text {
            let status = ci.attr_set(define, Attribute::CharsetId(AL32UTF8_CHARSET_ID), err);
            if !status.is_success() {
                return Err(native_error(ci, err, status).with_context(&self.name));
            }
        }
        self.define = Some(define);
        Ok(())
    }

    pub(crate) fn define_target(&mut self) -> Result<DefineTarget<'_>> {
        let define = self
            .define
            .ok_or_else(|| Error::internal(format!("column {} is not defined", self.name)))?;
        Ok(self.buffer.define_target(define))
    }

    /// Free the buffers. Safe to call more than once.
    pub(crate) fn release(&mut self) {
        self.buffer.release();
        self.define = None;
    }

    pub(crate) fn is_released(&self) -> bool {
        self.buffer.is_released()
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("position", &self.position)
            .field("kind", &self.kind())
            .field("type_code", &self.type_code)
            .field("element_size", &self.element_size())
            .finish()
    }
}

/// A column read at the current row of its result set.
///
/// Obtained from [`ResultSet::column`](crate::ResultSet::column). `row` is the
/// slot inside the current batch, or `None` when the result set is not
/// positioned on a fetched row.
#[derive(Debug, Clone, Copy)]
pub struct ColumnValue<'a> {
    column: &'a Column,
    row: Option<usize>,
}

impl<'a> ColumnValue<'a> {
    pub(crate) fn new(column: &'a Column, row: Option<usize>) -> Self {
        Self { column, row }
    }

    /// Metadata of the underlying column.
    pub fn column(&self) -> &'a Column {
        self.column
    }

    pub fn name(&self) -> &'a str {
        &self.column.name
    }

    pub fn kind(&self) -> ValueKind {
        self.column.kind()
    }

    #[track_caller]
    fn row(&self) -> Result<usize> {
        self.row.ok_or_else(|| Error::no_current_row())
    }

    /// Whether the current row holds NULL. True when there is no current row.
    pub fn is_null(&self) -> bool {
        self.row.map_or(true, |row| self.column.buffer.is_null(row))
    }

    pub fn to_text(&self) -> Result<String> {
        self.column.buffer.read_text(self.row()?, &self.column.name)
    }

    /// Exact decimal representation of a Number column.
    pub fn to_decimal(&self) -> Result<String> {
        self.column.buffer.read_decimal(self.row()?, &self.column.name)
    }

    pub fn to_f64(&self) -> Result<f64> {
        decimal_to_f64(&self.to_decimal()?)
    }

    /// Integer value of a Number column; fractions are truncated toward zero.
    pub fn to_i64(&self) -> Result<i64> {
        decimal_to_i64(&self.to_decimal()?)
    }

    pub fn to_date_time(&self) -> Result<NaiveDateTime> {
        self.column.buffer.read_date(self.row()?, &self.column.name)
    }

    /// Decode according to the column kind; NULL becomes [`OracleValue::Null`].
    pub fn value(&self) -> Result<OracleValue> {
        self.column.buffer.read_value(self.row()?, &self.column.name)
    }
}
