//! Database connection over a native call-level interface.

use crate::error::Result;
use crate::native::session::{ClientInfo, ConnectParams, SessionHandles};
use crate::native::{check, CallInterface, Handle};
use crate::result_set::ResultSet;
use crate::statement::Statement;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

/// An open session.
///
/// Statements and result sets borrow the connection, so it cannot be closed
/// or dropped while any of them is alive. The driver is shared through `Rc`,
/// which keeps a connection on the thread that opened it.
pub struct Connection {
    driver: Rc<dyn CallInterface>,
    handles: SessionHandles,
    params: ConnectParams,
}

impl Connection {
    /// Open a session, identifying the local host, OS user and process.
    ///
    /// # Errors
    /// - `Error::OsApiFailed` if the local host name cannot be read.
    /// - `Error::EnvironmentCreateFailed` if the environment cannot be created.
    /// - `Error::NativeCallFailed` for any later step of the logon.
    ///
    /// Every handle allocated before a failure is freed.
    pub fn open(driver: Rc<dyn CallInterface>, params: &ConnectParams) -> Result<Self> {
        let client = ClientInfo::local(&params.program)?;
        Self::open_with_client(driver, params, &client)
    }

    /// Open a session reporting `client` as the client identification.
    pub fn open_with_client(
        driver: Rc<dyn CallInterface>,
        params: &ConnectParams,
        client: &ClientInfo,
    ) -> Result<Self> {
        let handles = SessionHandles::open(driver.as_ref(), params, client)?;
        debug!(
            service = %params.service_name,
            username = %params.username,
            non_blocking = params.non_blocking,
            "connection opened"
        );
        Ok(Self {
            driver,
            handles,
            params: params.clone(),
        })
    }

    /// End the session and free every native handle. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        if self.handles.is_open() {
            debug!(service = %self.params.service_name, "closing connection");
        }
        self.handles.close(self.driver.as_ref())
    }

    pub fn is_open(&self) -> bool {
        self.handles.is_open()
    }

    /// False once the server handle was switched to non-blocking mode.
    pub fn is_blocking(&self) -> bool {
        !self.handles.is_non_blocking()
    }

    /// Default batch size of result sets created from this connection.
    pub fn fetch_size(&self) -> u32 {
        self.params.fetch_size
    }

    pub fn params(&self) -> &ConnectParams {
        &self.params
    }

    /// Prepare `sql`.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        Statement::prepare(self, sql)
    }

    /// Prepare and execute `sql` once, without parameters.
    ///
    /// Returns the number of rows affected.
    pub fn execute(&self, sql: &str) -> Result<u64> {
        let mut statement = self.prepare(sql)?;
        statement.execute()?;
        statement.rows_affected()
    }

    /// Run a query. The result set owns the statement it was produced by.
    pub fn select(&self, sql: &str) -> Result<ResultSet<'_>> {
        self.select_with_fetch_size(sql, self.params.fetch_size)
    }

    /// [`select`](Self::select) with an explicit batch size.
    pub fn select_with_fetch_size(&self, sql: &str, fetch_size: u32) -> Result<ResultSet<'_>> {
        let mut statement = self.prepare(sql)?;
        let mut result_set = statement.select_detached(fetch_size)?;
        result_set.attach_statement(statement);
        Ok(result_set)
    }

    pub fn commit(&self) -> Result<()> {
        let err = self.error_handle()?;
        let service = self.service_handle()?;
        check(self.driver(), err, self.driver.trans_commit(service, err))?;
        debug!("transaction committed");
        Ok(())
    }

    pub fn rollback(&self) -> Result<()> {
        let err = self.error_handle()?;
        let service = self.service_handle()?;
        check(self.driver(), err, self.driver.trans_rollback(service, err))?;
        debug!("transaction rolled back");
        Ok(())
    }

    pub(crate) fn driver(&self) -> &dyn CallInterface {
        self.driver.as_ref()
    }

    pub(crate) fn env_handle(&self) -> Result<Handle> {
        self.handles.env()
    }

    pub(crate) fn error_handle(&self) -> Result<Handle> {
        self.handles.error()
    }

    pub(crate) fn service_handle(&self) -> Result<Handle> {
        self.handles.service()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "connection close failed");
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("params", &self.params)
            .field("open", &self.is_open())
            .field("blocking", &self.is_blocking())
            .finish()
    }
}
