//! Buffered row cursor over an executed query.
//!
//! A [`ResultSet`] describes the select list of a statement handle, defines
//! one [`Column`] per position and pulls rows from the native layer one batch
//! at a time. [`ResultSet::next`] is the only way to move the cursor.
//!
//! ```
//! use std::rc::Rc;
//! use oracle_bound_rs::native::sim::{SimColumn, SimInterface, SimQuery, SimScript};
//! use oracle_bound_rs::{ConnectParams, Connection};
//!
//! let sim = Rc::new(SimInterface::new());
//! sim.register(
//!     "SELECT id, name FROM emp",
//!     SimScript::query(
//!         SimQuery::new(vec![SimColumn::number("ID"), SimColumn::text("NAME", 20)])
//!             .row(vec![7.into(), "SMITH".into()]),
//!     ),
//! );
//! let conn = Connection::open(sim, &ConnectParams::new("ORCL", "scott", "tiger"))?;
//! let mut rows = conn.select("SELECT id, name FROM emp")?;
//! while rows.next()? {
//!     let id = rows.column("id")?.to_i64()?;
//!     let name = rows.column(2usize)?.to_text()?;
//!     assert_eq!((id, name.as_str()), (7, "SMITH"));
//! }
//! # Ok::<(), oracle_bound_rs::Error>(())
//! ```

use crate::column::{Column, ColumnValue};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::native::constants::FIRST_INDEX;
use crate::native::types::ColumnDescription;
use crate::native::{native_error, Handle, Status};
use crate::statement::Statement;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace, warn};

/// Who frees the native statement handle a result set reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOwner {
    /// The result set frees the handle on release.
    OwnedByThisResultSet,
    /// The cursor parameter that produced the result set frees it.
    OwnedByParameterCursor,
    /// The statement whose `select` produced the result set frees it.
    OwnedByStatementSelect,
}

/// Column lookup key: a name (case-insensitive) or a 1-based ordinal.
pub trait ColumnIndex: fmt::Display {
    #[doc(hidden)]
    fn locate(&self, by_name: &HashMap<String, usize>, count: usize) -> Option<usize>;
}

impl ColumnIndex for &str {
    fn locate(&self, by_name: &HashMap<String, usize>, _count: usize) -> Option<usize> {
        by_name.get(&self.to_uppercase()).copied()
    }
}

impl ColumnIndex for String {
    fn locate(&self, by_name: &HashMap<String, usize>, count: usize) -> Option<usize> {
        self.as_str().locate(by_name, count)
    }
}

impl ColumnIndex for usize {
    fn locate(&self, _by_name: &HashMap<String, usize>, count: usize) -> Option<usize> {
        self.checked_sub(FIRST_INDEX).filter(|&index| index < count)
    }
}

/// Rows of an executed query, read one batch at a time.
pub struct ResultSet<'conn> {
    conn: &'conn Connection,
    handle: Option<Handle>,
    owner: HandleOwner,
    columns: Vec<Column>,
    by_name: HashMap<String, usize>,
    fetch_size: u32,
    rows_fetched: u32,
    current_row: usize,
    started: bool,
    eod: bool,
    described: bool,
    defined: bool,
    statement: Option<Box<Statement<'conn>>>,
}

impl<'conn> ResultSet<'conn> {
    /// Describe and define the select list of `handle`.
    ///
    /// A failure releases whatever was built; the handle itself is only
    /// freed when `owner` says this result set owns it.
    pub(crate) fn attach(
        conn: &'conn Connection,
        handle: Handle,
        owner: HandleOwner,
        fetch_size: u32,
    ) -> Result<Self> {
        let mut result_set = Self {
            conn,
            handle: Some(handle),
            owner,
            columns: Vec::new(),
            by_name: HashMap::new(),
            fetch_size: fetch_size.max(1),
            rows_fetched: 0,
            current_row: 0,
            started: false,
            eod: false,
            described: false,
            defined: false,
            statement: None,
        };
        result_set.describe()?;
        result_set.define()?;
        Ok(result_set)
    }

    /// Attach and fetch the first batch.
    pub(crate) fn open(
        conn: &'conn Connection,
        handle: Handle,
        owner: HandleOwner,
        fetch_size: u32,
    ) -> Result<Self> {
        let mut result_set = Self::attach(conn, handle, owner, fetch_size)?;
        result_set.fetch_rows()?;
        Ok(result_set)
    }

    fn handle(&self) -> Result<Handle> {
        self.handle
            .ok_or_else(|| Error::internal("result set is released"))
    }

    fn describe(&mut self) -> Result<()> {
        let conn = self.conn;
        let ci = conn.driver();
        let err = conn.error_handle()?;
        let handle = self.handle()?;
        let count = ci
            .param_count(handle, err)
            .map_err(|status| native_error(ci, err, status))?;

        for position in FIRST_INDEX..FIRST_INDEX + count as usize {
            let description = ColumnDescription::read(ci, handle, err, position)?;
            let column = Column::new(&description, self.fetch_size)?;
            self.by_name
                .entry(description.name.to_uppercase())
                .or_insert(self.columns.len());
            self.columns.push(column);
        }
        self.described = true;
        debug!(columns = self.columns.len(), "select list described");
        Ok(())
    }

    fn define(&mut self) -> Result<()> {
        if !self.described {
            return Err(Error::internal("result set must be described before define"));
        }
        let conn = self.conn;
        let ci = conn.driver();
        let err = conn.error_handle()?;
        let handle = self.handle()?;
        for column in &mut self.columns {
            column.define(ci, handle, err)?;
        }
        self.defined = self.columns.iter().all(Column::is_defined);
        debug!(columns = self.columns.len(), fetch_size = self.fetch_size, "select list defined");
        Ok(())
    }

    /// Fetch the next batch into the column buffers. Returns the number of new rows.
    fn fetch_rows(&mut self) -> Result<u32> {
        if !(self.described && self.defined) {
            return Err(Error::internal("result set must be defined before fetch"));
        }
        let conn = self.conn;
        let ci = conn.driver();
        let err = conn.error_handle()?;
        let handle = self.handle()?;

        let mut targets = self
            .columns
            .iter_mut()
            .map(Column::define_target)
            .collect::<Result<Vec<_>>>()?;
        let status = ci.stmt_fetch(handle, err, self.fetch_size, &mut targets);
        drop(targets);

        match status {
            Status::Success | Status::SuccessWithInfo | Status::NoData => {
                let total = ci
                    .row_count(handle, err)
                    .map_err(|status| native_error(ci, err, status))?;
                let new_rows = total.saturating_sub(self.rows_fetched);
                self.rows_fetched = total;
                if new_rows < self.fetch_size {
                    self.eod = true;
                }
                trace!(
                    new_rows,
                    rows_fetched = self.rows_fetched,
                    eod = self.eod,
                    "fetched batch"
                );
                Ok(new_rows)
            }
            status => Err(native_error(ci, err, status)),
        }
    }

    /// Advance to the next row, fetching a new batch when the current one is used up.
    ///
    /// The first call positions the cursor on the first row. Returns `false`
    /// once every row has been visited.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<bool> {
        if !self.started {
            self.started = true;
        } else if self.current_row < self.rows_fetched as usize {
            self.current_row += 1;
        }
        if self.current_row >= self.rows_fetched as usize && !self.eod {
            self.fetch_rows()?;
        }
        Ok(self.current_row < self.rows_fetched as usize)
    }

    /// True when the cursor is past the last row and the native layer reported end of data.
    pub fn is_eod(&self) -> bool {
        self.current_row >= self.rows_fetched as usize && self.eod
    }

    /// Slot of the current row inside the batch buffers.
    fn current_slot(&self) -> Option<usize> {
        (self.current_row < self.rows_fetched as usize)
            .then(|| self.current_row % self.fetch_size as usize)
    }

    /// Value of a column at the current row.
    ///
    /// # Errors
    /// Returns `Error::ColumnNotFound` if no column matches `index`.
    pub fn column<I: ColumnIndex>(&self, index: I) -> Result<ColumnValue<'_>> {
        let position = index
            .locate(&self.by_name, self.columns.len())
            .ok_or_else(|| Error::column_not_found(&index))?;
        Ok(ColumnValue::new(&self.columns[position], self.current_slot()))
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Rows fetched so far, across all batches.
    pub fn rows_fetched(&self) -> u32 {
        self.rows_fetched
    }

    pub fn fetch_size(&self) -> u32 {
        self.fetch_size
    }

    pub fn owner(&self) -> HandleOwner {
        self.owner
    }

    /// Keep `statement` alive for as long as this result set.
    pub(crate) fn attach_statement(&mut self, statement: Statement<'conn>) {
        self.statement = Some(Box::new(statement));
    }

    /// Free the columns, the owned statement and, when owned, the native handle.
    /// Safe to call more than once.
    pub fn release(&mut self) -> Result<()> {
        for column in &mut self.columns {
            column.release();
        }
        self.columns.clear();
        self.by_name.clear();
        self.described = false;
        self.defined = false;

        let mut result = Ok(());
        if let Some(mut statement) = self.statement.take() {
            result = statement.release();
        }
        if let Some(handle) = self.handle.take() {
            if self.owner == HandleOwner::OwnedByThisResultSet {
                let status = self.conn.driver().handle_free(handle);
                if !status.is_success() && result.is_ok() {
                    result = Err(Error::native(status, 0, "freeing statement handle"));
                }
            }
        }
        result
    }
}

impl Drop for ResultSet<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(error = %err, "result set release failed");
        }
    }
}

impl fmt::Debug for ResultSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("owner", &self.owner)
            .field("columns", &self.columns)
            .field("fetch_size", &self.fetch_size)
            .field("rows_fetched", &self.rows_fetched)
            .field("current_row", &self.current_row)
            .field("eod", &self.eod)
            .finish()
    }
}
