//! Named bind sites of a statement.
//!
//! A [`Parameter`] owns a single-row buffer that is bound by name as soon as
//! the parameter is created. Its value kind comes either from the caller or
//! from the name prefix (`:n` number, `:d` date, `:s` text, `:c` cursor, with
//! an optional `t` array marker before the kind character).
//!
//! Cursor parameters also own a native sub-statement handle. After the
//! statement executes, [`Parameter::to_result_set`] wraps that handle in a
//! [`ResultSet`] the first time it is called.

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::native::constants::{AL32UTF8_CHARSET_ID, MAX_OUTPUT_TEXT_BYTES};
use crate::native::decode::{decimal_to_f64, decimal_to_i64, f64_to_decimal};
use crate::native::types::{
    has_array_marker, infer_parameter, normalize_bind_name, BatchBuffer, Layout, OracleValue,
    ParameterType, ValueKind,
};
use crate::native::{native_error, Attribute, BindTarget, Handle, HandleType};
use crate::result_set::{HandleOwner, ResultSet};
use chrono::NaiveDateTime;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

/// One bound input/output value of a [`Statement`](crate::Statement).
pub struct Parameter<'conn> {
    conn: &'conn Connection,
    name: String,
    is_array: bool,
    buffer: BatchBuffer,
    bind: Option<Handle>,
    cursor: Option<Handle>,
    result_set: Option<Box<ResultSet<'conn>>>,
    fetch_size: u32,
    executed: Rc<Cell<bool>>,
}

impl<'conn> Parameter<'conn> {
    /// Allocate the buffer and bind it to `stmt` under `name`.
    pub(crate) fn new(
        conn: &'conn Connection,
        stmt: Handle,
        name: &str,
        kind: Option<ValueKind>,
        fetch_size: u32,
        executed: Rc<Cell<bool>>,
    ) -> Result<Self> {
        let name = normalize_bind_name(name);
        let parameter_type = match kind {
            Some(kind) => ParameterType {
                kind,
                is_array: has_array_marker(&name),
            },
            None => infer_parameter(&name)?,
        };
        // the text slot holds MAX_OUTPUT_TEXT_BYTES including the terminator
        let layout = Layout::for_kind(parameter_type.kind, MAX_OUTPUT_TEXT_BYTES - 1)
            .ok_or_else(|| Error::internal(format!("parameter {} has no value kind", name)))?;
        let buffer = BatchBuffer::allocate(layout, 1, true)?;

        let mut parameter = Self {
            conn,
            name,
            is_array: parameter_type.is_array,
            buffer,
            bind: None,
            cursor: None,
            result_set: None,
            fetch_size: fetch_size.max(1),
            executed,
        };
        // on failure, drop releases the sub-statement handle
        parameter.bind_to(stmt)?;
        debug!(name = %parameter.name, kind = %layout.kind, "parameter bound");
        Ok(parameter)
    }

    fn bind_to(&mut self, stmt: Handle) -> Result<()> {
        let conn = self.conn;
        let ci = conn.driver();
        let err = conn.error_handle()?;
        let layout = self.buffer.layout();

        if layout.kind == ValueKind::Cursor {
            let env = conn.env_handle()?;
            let cursor = ci
                .handle_alloc(env, HandleType::Statement)
                .map_err(|status| native_error(ci, env, status).with_context(&self.name))?;
            self.cursor = Some(cursor);
        }

        let bind = ci
            .bind_by_name(stmt, err, &self.name, layout.wire, layout.element_size)
            .map_err(|status| native_error(ci, err, status).with_context(&self.name))?;
        if layout.kind == ValueKind::Text {
            let status = ci.attr_set(bind, Attribute::CharsetId(AL32UTF8_CHARSET_ID), err);
            if !status.is_success() {
                return Err(native_error(ci, err, status).with_context(&self.name));
            }
        }
        self.bind = Some(bind);
        Ok(())
    }

    /// Bind name including the `:` sigil.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.buffer.layout().kind
    }

    /// Whether the name carried the array marker.
    pub fn is_array(&self) -> bool {
        self.is_array
    }

    /// Bytes reserved for the value.
    pub fn element_size(&self) -> usize {
        self.buffer.element_size()
    }

    /// Batch size of the result set produced by a cursor parameter.
    pub fn fetch_size(&self) -> u32 {
        self.fetch_size
    }

    pub fn is_null(&self) -> bool {
        self.buffer.is_null(0)
    }

    /// Mark the value NULL. The buffer contents are left untouched.
    pub fn set_null(&mut self) {
        self.buffer.set_null(0);
    }

    /// Assign text. Values longer than the buffer are truncated on a character boundary.
    pub fn set_text(&mut self, value: &str) -> Result<()> {
        self.buffer.write_text(0, &self.name, value)
    }

    /// Assign a number given as a decimal literal, e.g. `"-12.50"`.
    pub fn set_decimal(&mut self, value: &str) -> Result<()> {
        self.buffer.write_decimal(0, &self.name, value)
    }

    pub fn set_i64(&mut self, value: i64) -> Result<()> {
        self.set_decimal(&value.to_string())
    }

    pub fn set_f64(&mut self, value: f64) -> Result<()> {
        if self.kind() != ValueKind::Number {
            return Err(Error::bad_input(&self.name, self.kind(), "number"));
        }
        self.set_decimal(&f64_to_decimal(value)?)
    }

    pub fn set_date_time(&mut self, value: &NaiveDateTime) -> Result<()> {
        self.buffer.write_date(0, &self.name, value)
    }

    /// Assign any value; [`OracleValue::Null`] sets the parameter NULL.
    pub fn set_value(&mut self, value: &OracleValue) -> Result<()> {
        match value {
            OracleValue::Null => {
                self.set_null();
                Ok(())
            }
            OracleValue::Number(text) => self.set_decimal(text),
            OracleValue::Date(date) => self.set_date_time(date),
            OracleValue::Text(text) => self.set_text(text),
        }
    }

    pub fn to_text(&self) -> Result<String> {
        self.buffer.read_text(0, &self.name)
    }

    /// Exact decimal representation of a number parameter.
    pub fn to_decimal(&self) -> Result<String> {
        self.buffer.read_decimal(0, &self.name)
    }

    pub fn to_i64(&self) -> Result<i64> {
        decimal_to_i64(&self.to_decimal()?)
    }

    pub fn to_f64(&self) -> Result<f64> {
        decimal_to_f64(&self.to_decimal()?)
    }

    pub fn to_date_time(&self) -> Result<NaiveDateTime> {
        self.buffer.read_date(0, &self.name)
    }

    pub fn value(&self) -> Result<OracleValue> {
        self.buffer.read_value(0, &self.name)
    }

    /// Result set opened by the executed statement on this cursor parameter.
    ///
    /// Built on the first call, which also fetches the first batch; later
    /// calls return the same result set until the statement executes again.
    ///
    /// # Errors
    /// - `Error::BadOutputType` if this is not a cursor parameter.
    /// - `Error::StatementNotExecuted` if the statement has not executed.
    pub fn to_result_set(&mut self) -> Result<&mut ResultSet<'conn>> {
        if self.kind() != ValueKind::Cursor {
            return Err(Error::bad_output(&self.name, self.kind(), "cursor"));
        }
        if !self.executed.get() {
            return Err(Error::not_executed(&self.name));
        }
        let result_set = match self.result_set.take() {
            Some(result_set) => result_set,
            None => {
                let handle = self
                    .cursor
                    .ok_or_else(|| Error::internal(format!("cursor parameter {} is released", self.name)))?;
                Box::new(ResultSet::open(
                    self.conn,
                    handle,
                    HandleOwner::OwnedByParameterCursor,
                    self.fetch_size,
                )?)
            }
        };
        Ok(&mut **self.result_set.insert(result_set))
    }

    /// Drop the result set of a previous execution.
    pub(crate) fn reset_cursor(&mut self) {
        if let Some(mut result_set) = self.result_set.take() {
            if let Err(err) = result_set.release() {
                warn!(name = %self.name, error = %err, "failed to release cursor result set");
            }
        }
    }

    pub(crate) fn bind_target(&mut self) -> Result<BindTarget<'_>> {
        let bind = self
            .bind
            .ok_or_else(|| Error::internal(format!("parameter {} is not bound", self.name)))?;
        self.buffer.bind_target(bind, self.cursor)
    }

    /// Free the child result set, the sub-statement handle and the buffer.
    /// Safe to call more than once.
    pub(crate) fn release(&mut self) -> Result<()> {
        let mut result = Ok(());
        if let Some(mut result_set) = self.result_set.take() {
            result = result_set.release();
        }
        if let Some(cursor) = self.cursor.take() {
            let status = self.conn.driver().handle_free(cursor);
            if !status.is_success() && result.is_ok() {
                result = Err(Error::native(status, 0, "freeing cursor handle").with_context(&self.name));
            }
        }
        self.bind = None;
        self.buffer.release();
        result
    }
}

impl Drop for Parameter<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(name = %self.name, error = %err, "parameter release failed");
        }
    }
}

impl fmt::Debug for Parameter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("is_array", &self.is_array)
            .field("is_null", &self.is_null())
            .field("has_result_set", &self.result_set.is_some())
            .finish()
    }
}
