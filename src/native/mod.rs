//! Native call-level interface boundary.
//!
//! [`CallInterface`] is the opaque capability set the client drives: handle
//! allocation, attribute setting, prepare, bind-by-name, define-by-position,
//! execute and fetch. Every method is one native round trip and reports a
//! [`Status`]; diagnostic text is fetched separately with
//! [`CallInterface::error_get`], the way the native layer does it.
//!
//! Buffers never leave their owners. Binds and defines only register a
//! layout; the bytes travel as borrowed [`BindTarget`] / [`DefineTarget`]
//! views for the duration of a single execute or fetch call.

pub mod constants;
pub mod decode;
pub mod session;
pub mod sim;
pub mod types;

use crate::error::{Error, Result};
use constants::*;
use std::fmt;
use types::WireType;

/// Result of a native call that yields a value.
pub type NativeResult<T> = std::result::Result<T, Status>;

/// Status code returned by every native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    SuccessWithInfo,
    NeedData,
    NoData,
    Error,
    InvalidHandle,
    StillExecuting,
    Continue,
    /// A code this client does not know.
    Other(i32),
}

impl Status {
    /// Map a raw native status code.
    pub fn from_code(code: i32) -> Self {
        match code {
            OCI_SUCCESS => Status::Success,
            OCI_SUCCESS_WITH_INFO => Status::SuccessWithInfo,
            OCI_NEED_DATA => Status::NeedData,
            OCI_NO_DATA => Status::NoData,
            OCI_ERROR => Status::Error,
            OCI_INVALID_HANDLE => Status::InvalidHandle,
            OCI_STILL_EXECUTING => Status::StillExecuting,
            OCI_CONTINUE => Status::Continue,
            other => Status::Other(other),
        }
    }

    /// Raw native status code.
    pub fn code(self) -> i32 {
        match self {
            Status::Success => OCI_SUCCESS,
            Status::SuccessWithInfo => OCI_SUCCESS_WITH_INFO,
            Status::NeedData => OCI_NEED_DATA,
            Status::NoData => OCI_NO_DATA,
            Status::Error => OCI_ERROR,
            Status::InvalidHandle => OCI_INVALID_HANDLE,
            Status::StillExecuting => OCI_STILL_EXECUTING,
            Status::Continue => OCI_CONTINUE,
            Status::Other(code) => code,
        }
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    /// Whether the native layer keeps a diagnostic record for this status.
    pub fn has_diagnostics(self) -> bool {
        matches!(
            self,
            Status::SuccessWithInfo | Status::Error | Status::NoData | Status::StillExecuting
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => f.write_str("OCI_SUCCESS"),
            Status::SuccessWithInfo => f.write_str("OCI_SUCCESS_WITH_INFO"),
            Status::NeedData => f.write_str("OCI_NEED_DATA"),
            Status::NoData => f.write_str("OCI_NO_DATA"),
            Status::Error => f.write_str("OCI_ERROR"),
            Status::InvalidHandle => f.write_str("OCI_INVALID_HANDLE"),
            Status::StillExecuting => f.write_str("OCI_STILL_EXECUTING"),
            Status::Continue => f.write_str("OCI_CONTINUE"),
            Status::Other(code) => write!(f, "OCI status {}", code),
        }
    }
}

/// Kind of a native handle or descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleType {
    Environment,
    Error,
    ServiceContext,
    Statement,
    Bind,
    Define,
    Server,
    Session,
    ParamDescriptor,
}

impl HandleType {
    pub fn code(self) -> u32 {
        match self {
            HandleType::Environment => OCI_HTYPE_ENV,
            HandleType::Error => OCI_HTYPE_ERROR,
            HandleType::ServiceContext => OCI_HTYPE_SVCCTX,
            HandleType::Statement => OCI_HTYPE_STMT,
            HandleType::Bind => OCI_HTYPE_BIND,
            HandleType::Define => OCI_HTYPE_DEFINE,
            HandleType::Server => OCI_HTYPE_SERVER,
            HandleType::Session => OCI_HTYPE_SESSION,
            HandleType::ParamDescriptor => OCI_DTYPE_PARAM,
        }
    }
}

/// Opaque native handle.
///
/// Copyable token; the native layer owns whatever it refers to, and the
/// client owner that allocated it is responsible for freeing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    kind: HandleType,
    id: u64,
}

impl Handle {
    pub fn new(kind: HandleType, id: u64) -> Self {
        Self { kind, id }
    }

    pub fn kind(&self) -> HandleType {
        self.kind
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Environment creation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvMode {
    #[default]
    Default,
    Threaded,
    Object,
}

impl EnvMode {
    pub fn code(self) -> u32 {
        match self {
            EnvMode::Default => 0,
            EnvMode::Threaded => 1,
            EnvMode::Object => 2,
        }
    }
}

/// Attribute written with [`CallInterface::attr_set`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Attribute<'a> {
    Server(Handle),
    Session(Handle),
    Username(&'a str),
    Password(&'a str),
    NonBlockingMode(bool),
    Module(&'a str),
    ClientInfo(&'a str),
    CharsetId(u16),
}

impl Attribute<'_> {
    pub fn code(&self) -> u32 {
        match self {
            Attribute::Server(_) => OCI_ATTR_SERVER,
            Attribute::Session(_) => OCI_ATTR_SESSION,
            Attribute::Username(_) => OCI_ATTR_USERNAME,
            Attribute::Password(_) => OCI_ATTR_PASSWORD,
            Attribute::NonBlockingMode(_) => OCI_ATTR_NONBLOCKING_MODE,
            Attribute::Module(_) => OCI_ATTR_MODULE,
            Attribute::ClientInfo(_) => OCI_ATTR_CLIENT_INFO,
            Attribute::CharsetId(_) => OCI_ATTR_CHARSET_ID,
        }
    }
}

/// Diagnostic record read back from an error or environment handle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorRecord {
    pub code: i32,
    pub message: String,
}

/// One parameter's single-row buffer, lent to the native layer for an execute.
///
/// Input values are read from `data`; out and in/out values are written
/// back into it, together with the indicator and length.
#[derive(Debug)]
pub struct BindTarget<'a> {
    pub bind: Handle,
    pub wire: WireType,
    pub data: &'a mut [u8],
    pub indicator: &'a mut i16,
    pub length: &'a mut u16,
    /// Sub-statement handle receiving a ref cursor.
    pub nested: Option<Handle>,
}

/// One column's batch buffers, lent to the native layer for a fetch.
///
/// Row `i` occupies `data[i * element_size..(i + 1) * element_size]`.
#[derive(Debug)]
pub struct DefineTarget<'a> {
    pub define: Handle,
    pub wire: WireType,
    pub element_size: usize,
    pub data: &'a mut [u8],
    pub indicators: &'a mut [i16],
    pub lengths: Option<&'a mut [u16]>,
}

/// The native call-level interface.
///
/// Implementations are single-threaded; calls on one environment must not be
/// interleaved from different threads.
pub trait CallInterface {
    /// Create an environment handle.
    fn env_create(&self, mode: EnvMode) -> NativeResult<Handle>;

    /// Allocate a handle under `parent` (the environment).
    fn handle_alloc(&self, parent: Handle, kind: HandleType) -> NativeResult<Handle>;

    /// Free a handle or descriptor.
    fn handle_free(&self, handle: Handle) -> Status;

    fn attr_set(&self, target: Handle, attribute: Attribute<'_>, err: Handle) -> Status;

    fn server_attach(&self, server: Handle, err: Handle, service_name: &str) -> Status;

    fn server_detach(&self, server: Handle, err: Handle) -> Status;

    fn session_begin(&self, service: Handle, err: Handle, session: Handle) -> Status;

    fn session_end(&self, service: Handle, err: Handle, session: Handle) -> Status;

    fn stmt_prepare(&self, stmt: Handle, err: Handle, sql: &str) -> Status;

    /// Statement type attribute of a prepared statement.
    fn stmt_type(&self, stmt: Handle, err: Handle) -> NativeResult<u16>;

    /// Register a named bind site. `name` includes the `:` sigil.
    fn bind_by_name(
        &self,
        stmt: Handle,
        err: Handle,
        name: &str,
        wire: WireType,
        element_size: usize,
    ) -> NativeResult<Handle>;

    /// Execute a prepared statement, exchanging bind values through `binds`.
    fn stmt_execute(
        &self,
        service: Handle,
        stmt: Handle,
        err: Handle,
        iters: u32,
        binds: &mut [BindTarget<'_>],
    ) -> Status;

    /// Number of select-list items of an executed statement.
    fn param_count(&self, stmt: Handle, err: Handle) -> NativeResult<u32>;

    /// Parameter descriptor for a 1-based select-list position.
    fn param_get(&self, stmt: Handle, err: Handle, position: u32) -> NativeResult<Handle>;

    fn param_name(&self, param: Handle, err: Handle) -> NativeResult<String>;

    fn param_data_type(&self, param: Handle, err: Handle) -> NativeResult<u16>;

    fn param_data_size(&self, param: Handle, err: Handle) -> NativeResult<u32>;

    fn descriptor_free(&self, descriptor: Handle) -> Status;

    /// Register an output layout for a 1-based select-list position.
    fn define_by_pos(
        &self,
        stmt: Handle,
        err: Handle,
        position: u32,
        wire: WireType,
        element_size: usize,
    ) -> NativeResult<Handle>;

    /// Fetch up to `rows` rows into the defined buffers, starting at row 0.
    fn stmt_fetch(
        &self,
        stmt: Handle,
        err: Handle,
        rows: u32,
        targets: &mut [DefineTarget<'_>],
    ) -> Status;

    /// Cumulative number of rows fetched (or rows affected for DML).
    fn row_count(&self, stmt: Handle, err: Handle) -> NativeResult<u32>;

    fn trans_commit(&self, service: Handle, err: Handle) -> Status;

    fn trans_rollback(&self, service: Handle, err: Handle) -> Status;

    /// Diagnostic record `record` (1-based) kept on an error or environment handle.
    fn error_get(&self, handle: Handle, record: u32) -> Option<ErrorRecord>;
}

/// Convert a native failure into an [`Error`], reading its diagnostic record.
#[track_caller]
pub(crate) fn native_error(ci: &dyn CallInterface, err: Handle, status: Status) -> Error {
    let record = if status.has_diagnostics() {
        ci.error_get(err, 1).unwrap_or_default()
    } else {
        ErrorRecord::default()
    };
    Error::native(status, record.code, record.message)
}

/// Fail unless `status` is [`Status::Success`].
#[track_caller]
pub(crate) fn check(ci: &dyn CallInterface, err: Handle, status: Status) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(native_error(ci, err, status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        for status in [
            Status::Success,
            Status::SuccessWithInfo,
            Status::NeedData,
            Status::NoData,
            Status::Error,
            Status::InvalidHandle,
            Status::StillExecuting,
            Status::Continue,
        ] {
            assert_eq!(Status::from_code(status.code()), status);
        }
        assert_eq!(Status::from_code(-24200), Status::Continue);
        assert_eq!(Status::from_code(7), Status::Other(7));
    }

    #[test]
    fn test_status_diagnostics() {
        assert!(Status::Error.has_diagnostics());
        assert!(Status::NoData.has_diagnostics());
        assert!(!Status::InvalidHandle.has_diagnostics());
        assert!(!Status::Success.has_diagnostics());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::Error.to_string(), "OCI_ERROR");
        assert_eq!(Status::StillExecuting.to_string(), "OCI_STILL_EXECUTING");
        assert_eq!(Status::Other(42).to_string(), "OCI status 42");
    }
}
