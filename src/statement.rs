//! Prepared statements.

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::native::constants::*;
use crate::native::types::{normalize_bind_name, ValueKind};
use crate::native::{check, native_error, HandleType, Handle, Status};
use crate::parameter::Parameter;
use crate::result_set::{HandleOwner, ResultSet};
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

/// Statement classification reported by the native layer after prepare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementType {
    Unknown,
    Select,
    Update,
    Delete,
    Insert,
    Create,
    Drop,
    Alter,
    Begin,
    Declare,
    /// A code this client does not know.
    Other(u16),
}

impl StatementType {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => StatementType::Unknown,
            OCI_STMT_SELECT => StatementType::Select,
            OCI_STMT_UPDATE => StatementType::Update,
            OCI_STMT_DELETE => StatementType::Delete,
            OCI_STMT_INSERT => StatementType::Insert,
            OCI_STMT_CREATE => StatementType::Create,
            OCI_STMT_DROP => StatementType::Drop,
            OCI_STMT_ALTER => StatementType::Alter,
            OCI_STMT_BEGIN => StatementType::Begin,
            OCI_STMT_DECLARE => StatementType::Declare,
            other => StatementType::Other(other),
        }
    }

    /// PL/SQL blocks.
    pub fn is_plsql(self) -> bool {
        matches!(self, StatementType::Begin | StatementType::Declare)
    }
}

/// Parameter lookup key: a bind name (with or without `:`) or a 1-based ordinal.
pub trait ParameterIndex: fmt::Display {
    #[doc(hidden)]
    fn locate(&self, by_name: &HashMap<String, usize>, count: usize) -> Option<usize>;
}

impl ParameterIndex for &str {
    fn locate(&self, by_name: &HashMap<String, usize>, _count: usize) -> Option<usize> {
        by_name.get(&normalize_bind_name(self)).copied()
    }
}

impl ParameterIndex for usize {
    fn locate(&self, _by_name: &HashMap<String, usize>, count: usize) -> Option<usize> {
        self.checked_sub(FIRST_INDEX).filter(|&index| index < count)
    }
}

/// A prepared SQL statement with its bound parameters.
///
/// Parameters are bound once and keep their buffers between executions, so
/// a statement can be re-executed with new values:
///
/// ```
/// use std::rc::Rc;
/// use oracle_bound_rs::native::sim::SimInterface;
/// use oracle_bound_rs::{ConnectParams, Connection};
///
/// let sim = Rc::new(SimInterface::new());
/// let conn = Connection::open(sim.clone(), &ConnectParams::new("ORCL", "scott", "tiger"))?;
/// let mut stmt = conn.prepare("INSERT INTO t (id, name) VALUES (:nId, :sName)")?;
/// stmt.bind(":nId")?;
/// stmt.bind("sName")?;
/// for (id, name) in [(1, "one"), (2, "two")] {
///     stmt.parameter_mut(":nId")?.set_i64(id)?;
///     stmt.parameter_mut(":sName")?.set_text(name)?;
///     stmt.execute()?;
/// }
/// assert_eq!(sim.executions().len(), 2);
/// # Ok::<(), oracle_bound_rs::Error>(())
/// ```
pub struct Statement<'conn> {
    conn: &'conn Connection,
    handle: Option<Handle>,
    sql: String,
    statement_type: StatementType,
    parameters: Vec<Parameter<'conn>>,
    by_name: HashMap<String, usize>,
    executed: Rc<Cell<bool>>,
}

impl<'conn> Statement<'conn> {
    /// Allocate a statement handle and prepare `sql` on it.
    pub(crate) fn prepare(conn: &'conn Connection, sql: &str) -> Result<Self> {
        let ci = conn.driver();
        let env = conn.env_handle()?;
        let err = conn.error_handle()?;
        let handle = ci
            .handle_alloc(env, HandleType::Statement)
            .map_err(|status| native_error(ci, env, status))?;

        // from here on, drop frees the handle
        let mut statement = Self {
            conn,
            handle: Some(handle),
            sql: sql.to_string(),
            statement_type: StatementType::Unknown,
            parameters: Vec::new(),
            by_name: HashMap::new(),
            executed: Rc::new(Cell::new(false)),
        };
        check(ci, err, ci.stmt_prepare(handle, err, sql))?;
        let code = ci
            .stmt_type(handle, err)
            .map_err(|status| native_error(ci, err, status))?;
        statement.statement_type = StatementType::from_code(code);
        debug!(sql, statement_type = ?statement.statement_type, "statement prepared");
        Ok(statement)
    }

    fn handle(&self) -> Result<Handle> {
        self.handle
            .ok_or_else(|| Error::internal("statement is released"))
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn statement_type(&self) -> StatementType {
        self.statement_type
    }

    pub fn is_prepared(&self) -> bool {
        self.handle.is_some()
    }

    pub fn is_executed(&self) -> bool {
        self.executed.get()
    }

    /// Bind a parameter whose kind is inferred from its name prefix.
    ///
    /// # Errors
    /// - `Error::UnrecognizedParameterPrefix` if the prefix selects no kind.
    /// - `Error::ParameterAlreadyBound` if the name is already bound.
    /// - `Error::NativeCallFailed` if the native bind fails.
    pub fn bind(&mut self, name: &str) -> Result<&mut Parameter<'conn>> {
        self.bind_parameter(name, None, self.conn.fetch_size())
    }

    /// Bind a parameter of an explicit kind, whatever its name.
    pub fn bind_as(&mut self, name: &str, kind: ValueKind) -> Result<&mut Parameter<'conn>> {
        self.bind_parameter(name, Some(kind), self.conn.fetch_size())
    }

    /// Bind a cursor parameter whose result set fetches `fetch_size` rows per batch.
    pub fn bind_cursor(&mut self, name: &str, fetch_size: u32) -> Result<&mut Parameter<'conn>> {
        self.bind_parameter(name, Some(ValueKind::Cursor), fetch_size)
    }

    fn bind_parameter(
        &mut self,
        name: &str,
        kind: Option<ValueKind>,
        fetch_size: u32,
    ) -> Result<&mut Parameter<'conn>> {
        let name = normalize_bind_name(name);
        if self.by_name.contains_key(&name) {
            return Err(Error::already_bound(&name));
        }
        let handle = self.handle()?;
        let parameter = Parameter::new(
            self.conn,
            handle,
            &name,
            kind,
            fetch_size,
            Rc::clone(&self.executed),
        )?;
        let index = self.parameters.len();
        self.by_name.insert(name, index);
        self.parameters.push(parameter);
        Ok(&mut self.parameters[index])
    }

    /// Execute once, exchanging every bound parameter with the native layer.
    ///
    /// Queries are executed without fetching; rows are fetched by the
    /// result set built from the statement.
    pub fn execute(&mut self) -> Result<()> {
        let conn = self.conn;
        let ci = conn.driver();
        let err = conn.error_handle()?;
        let service = conn.service_handle()?;
        let handle = self.handle()?;
        let iters = if self.statement_type == StatementType::Select { 0 } else { 1 };

        self.executed.set(false);
        for parameter in &mut self.parameters {
            parameter.reset_cursor();
        }
        let mut binds = self
            .parameters
            .iter_mut()
            .map(Parameter::bind_target)
            .collect::<Result<Vec<_>>>()?;
        let status = ci.stmt_execute(service, handle, err, iters, &mut binds);
        drop(binds);

        check(ci, err, status)?;
        self.executed.set(true);
        debug!(sql = %self.sql, iters, parameters = self.parameters.len(), "statement executed");
        Ok(())
    }

    /// Rows affected by the last DML execution.
    pub fn rows_affected(&self) -> Result<u64> {
        let ci = self.conn.driver();
        let err = self.conn.error_handle()?;
        ci.row_count(self.handle()?, err)
            .map(u64::from)
            .map_err(|status| native_error(ci, err, status))
    }

    /// Execute a query and return its first batch of rows.
    ///
    /// The result set reads from this statement's handle; the statement
    /// stays usable once the result set is dropped.
    ///
    /// # Errors
    /// Returns `Error::NotASelect` if the statement is not a query.
    pub fn select(&mut self) -> Result<ResultSet<'_>> {
        let fetch_size = self.conn.fetch_size();
        self.select_detached(fetch_size)
    }

    /// [`select`](Self::select) with an explicit batch size.
    pub fn select_with_fetch_size(&mut self, fetch_size: u32) -> Result<ResultSet<'_>> {
        self.select_detached(fetch_size)
    }

    pub(crate) fn select_detached(&mut self, fetch_size: u32) -> Result<ResultSet<'conn>> {
        let handle = self.execute_query()?;
        ResultSet::open(
            self.conn,
            handle,
            HandleOwner::OwnedByStatementSelect,
            fetch_size,
        )
    }

    /// Execute a query and hand the native handle over to the result set.
    pub fn into_result_set(mut self) -> Result<ResultSet<'conn>> {
        self.execute_query()?;
        let handle = self.handle()?;
        let conn = self.conn;
        // the result set frees the handle, even if opening it fails
        self.handle = None;
        ResultSet::open(conn, handle, HandleOwner::OwnedByThisResultSet, conn.fetch_size())
    }

    fn execute_query(&mut self) -> Result<Handle> {
        if self.statement_type != StatementType::Select {
            return Err(Error::not_a_select(self.statement_type));
        }
        self.execute()?;
        self.handle()
    }

    /// Look up a parameter by name or 1-based ordinal.
    pub fn parameter<I: ParameterIndex>(&self, index: I) -> Result<&Parameter<'conn>> {
        let position = index
            .locate(&self.by_name, self.parameters.len())
            .ok_or_else(|| Error::parameter_not_found(&index))?;
        Ok(&self.parameters[position])
    }

    pub fn parameter_mut<I: ParameterIndex>(&mut self, index: I) -> Result<&mut Parameter<'conn>> {
        let position = index
            .locate(&self.by_name, self.parameters.len())
            .ok_or_else(|| Error::parameter_not_found(&index))?;
        Ok(&mut self.parameters[position])
    }

    pub fn parameters(&self) -> &[Parameter<'conn>] {
        &self.parameters
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Release every parameter and free the statement handle.
    /// Safe to call more than once.
    pub fn release(&mut self) -> Result<()> {
        let mut result = Ok(());
        for parameter in &mut self.parameters {
            if let Err(err) = parameter.release() {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        self.parameters.clear();
        self.by_name.clear();
        self.executed.set(false);

        if let Some(handle) = self.handle.take() {
            match self.conn.driver().handle_free(handle) {
                Status::Success => {}
                Status::InvalidHandle => {
                    warn!(sql = %self.sql, "statement handle was already invalid");
                }
                status => {
                    if result.is_ok() {
                        result = Err(Error::native(status, 0, "freeing statement handle"));
                    }
                }
            }
        }
        result
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(sql = %self.sql, error = %err, "statement release failed");
        }
    }
}

impl fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("statement_type", &self.statement_type)
            .field("parameters", &self.parameters)
            .field("prepared", &self.is_prepared())
            .field("executed", &self.is_executed())
            .finish()
    }
}
