//! Error types for the bound-buffer Oracle client.
//!
//! Every error records the source location that raised it. [`Error::details`]
//! renders the multi-line diagnostic block (location, error type, description)
//! that applications usually log.

use crate::native::types::ValueKind;
use crate::native::Status;
use crate::statement::StatementType;
use std::fmt::{self, Write as _};
use std::io;
use std::panic::Location;
use thiserror::Error;

/// Result type alias for Oracle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad origin of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    /// Raised by the native call-level interface.
    Oracle,
    /// Raised by this library.
    OraLib,
    /// Raised by an operating system API.
    OsApi,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorType::Oracle => f.write_str("Oracle"),
            ErrorType::OraLib => f.write_str("OraLib"),
            ErrorType::OsApi => f.write_str("OS API"),
        }
    }
}

/// Error type for the client.
#[derive(Error, Debug)]
pub enum Error {
    /// A native call returned a non-success status.
    #[error("{}", describe_native(.status, .code, .message, .context))]
    NativeCallFailed {
        status: Status,
        /// ORA- error number, 0 when the native layer returned no record.
        code: i32,
        message: String,
        /// Parameter or column the call was made for.
        context: Option<String>,
        location: &'static Location<'static>,
    },

    /// The native environment handle could not be created.
    #[error("(EC_ENV_CREATE_FAILED) Environment creation failed ({status})")]
    EnvironmentCreateFailed {
        status: Status,
        location: &'static Location<'static>,
    },

    /// A native type code with no value kind mapping.
    #[error("(EC_UNSUP_ORA_TYPE) Unsupported Oracle type {type_code} for {name}")]
    UnsupportedNativeType {
        name: String,
        type_code: u16,
        location: &'static Location<'static>,
    },

    /// A parameter name whose prefix does not select a value kind.
    #[error("(EC_BAD_PARAM_PREFIX) Parameter name {name} has an unrecognized type prefix")]
    UnrecognizedParameterPrefix {
        name: String,
        location: &'static Location<'static>,
    },

    /// A value of the wrong kind was assigned to a parameter.
    #[error("(EC_BAD_INPUT_TYPE) Cannot assign {supplied} to {kind} parameter {name}")]
    BadInputType {
        name: String,
        kind: ValueKind,
        supplied: &'static str,
        location: &'static Location<'static>,
    },

    /// A value was read as the wrong kind, or a NULL value was read.
    #[error("(EC_BAD_OUTPUT_TYPE) {}", describe_bad_output(.name, .kind, .requested, .is_null))]
    BadOutputType {
        name: String,
        kind: ValueKind,
        requested: &'static str,
        is_null: bool,
        location: &'static Location<'static>,
    },

    /// Parameter lookup by name or ordinal missed.
    #[error("(EC_PARAMETER_NOT_FOUND) Parameter not found: {key}")]
    ParameterNotFound {
        key: String,
        location: &'static Location<'static>,
    },

    /// Column lookup by name or ordinal missed.
    #[error("(EC_COLUMN_NOT_FOUND) Column not found: {key}")]
    ColumnNotFound {
        key: String,
        location: &'static Location<'static>,
    },

    /// A parameter with this name is already bound on the statement.
    #[error("(EC_BAD_PARAM_TYPE) Parameter {name} is already bound")]
    ParameterAlreadyBound {
        name: String,
        location: &'static Location<'static>,
    },

    /// A cursor parameter was read before its statement executed.
    #[error("(EC_INTERNAL) Statement must be executed before reading cursor parameter {name}")]
    StatementNotExecuted {
        name: String,
        location: &'static Location<'static>,
    },

    /// `select` was called on a statement that is not a query.
    #[error("(EC_INTERNAL) Statement is not a SELECT (classified as {statement_type:?})")]
    NotASelect {
        statement_type: StatementType,
        location: &'static Location<'static>,
    },

    /// A column was read while the cursor is not positioned on a fetched row.
    #[error("(EC_INTERNAL) Result set is not positioned on a row")]
    NoCurrentRow {
        location: &'static Location<'static>,
    },

    /// A buffer allocation failed.
    #[error("(EC_NO_MEMORY) Not enough memory for {bytes} bytes")]
    NoMemory {
        bytes: usize,
        location: &'static Location<'static>,
    },

    /// An operating system API failed.
    #[error("OS API call failed: {source}")]
    OsApiFailed {
        source: io::Error,
        location: &'static Location<'static>,
    },

    /// A value could not be converted between its wire form and a Rust type.
    #[error("(EC_BAD_TRANSFORM) Type conversion error: {message}")]
    TypeConversion {
        message: String,
        location: &'static Location<'static>,
    },

    /// A broken internal precondition.
    #[error("(EC_INTERNAL) Internal error: {message}")]
    Internal {
        message: String,
        location: &'static Location<'static>,
    },
}

fn describe_native(status: &Status, code: &i32, message: &str, context: &Option<String>) -> String {
    let mut out = format!("({})", status);
    if *code != 0 || !message.is_empty() {
        out.push(' ');
        out.push_str(message.trim_end());
    }
    if let Some(context) = context {
        let _ = write!(out, " [{}]", context);
    }
    out
}

fn describe_bad_output(name: &str, kind: &ValueKind, requested: &str, is_null: &bool) -> String {
    if *is_null {
        format!("{} is NULL and cannot be read as {}", name, requested)
    } else {
        format!("Cannot read {} value {} as {}", kind, name, requested)
    }
}

impl Error {
    /// Create a native call failure.
    #[track_caller]
    pub fn native(status: Status, code: i32, message: impl Into<String>) -> Self {
        Self::NativeCallFailed {
            status,
            code,
            message: message.into(),
            context: None,
            location: Location::caller(),
        }
    }

    /// Create an environment creation failure.
    #[track_caller]
    pub fn environment_create_failed(status: Status) -> Self {
        Self::EnvironmentCreateFailed {
            status,
            location: Location::caller(),
        }
    }

    /// Create an unsupported native type error.
    #[track_caller]
    pub fn unsupported_native_type(name: impl Into<String>, type_code: u16) -> Self {
        Self::UnsupportedNativeType {
            name: name.into(),
            type_code,
            location: Location::caller(),
        }
    }

    /// Create an unrecognized parameter prefix error.
    #[track_caller]
    pub fn unrecognized_prefix(name: impl Into<String>) -> Self {
        Self::UnrecognizedParameterPrefix {
            name: name.into(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub(crate) fn bad_input(name: &str, kind: ValueKind, supplied: &'static str) -> Self {
        Self::BadInputType {
            name: name.to_string(),
            kind,
            supplied,
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub(crate) fn bad_output(name: &str, kind: ValueKind, requested: &'static str) -> Self {
        Self::BadOutputType {
            name: name.to_string(),
            kind,
            requested,
            is_null: false,
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub(crate) fn null_output(name: &str, kind: ValueKind, requested: &'static str) -> Self {
        Self::BadOutputType {
            name: name.to_string(),
            kind,
            requested,
            is_null: true,
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub(crate) fn parameter_not_found(key: impl fmt::Display) -> Self {
        Self::ParameterNotFound {
            key: key.to_string(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub(crate) fn column_not_found(key: impl fmt::Display) -> Self {
        Self::ColumnNotFound {
            key: key.to_string(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub(crate) fn already_bound(name: &str) -> Self {
        Self::ParameterAlreadyBound {
            name: name.to_string(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub(crate) fn not_executed(name: &str) -> Self {
        Self::StatementNotExecuted {
            name: name.to_string(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub(crate) fn not_a_select(statement_type: StatementType) -> Self {
        Self::NotASelect {
            statement_type,
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub(crate) fn no_current_row() -> Self {
        Self::NoCurrentRow {
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub(crate) fn no_memory(bytes: usize) -> Self {
        Self::NoMemory {
            bytes,
            location: Location::caller(),
        }
    }

    /// Create an OS API failure.
    #[track_caller]
    pub fn os_api(source: io::Error) -> Self {
        Self::OsApiFailed {
            source,
            location: Location::caller(),
        }
    }

    /// Create a type conversion error.
    #[track_caller]
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversion {
            message: message.into(),
            location: Location::caller(),
        }
    }

    /// Create an internal error.
    #[track_caller]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            location: Location::caller(),
        }
    }

    /// Attach the parameter or column name a native call was made for.
    pub(crate) fn with_context(mut self, name: &str) -> Self {
        if let Error::NativeCallFailed { context, .. } = &mut self {
            *context = Some(name.to_string());
        }
        self
    }

    /// Source location that raised the error.
    pub fn location(&self) -> &'static Location<'static> {
        match self {
            Error::NativeCallFailed { location, .. }
            | Error::EnvironmentCreateFailed { location, .. }
            | Error::UnsupportedNativeType { location, .. }
            | Error::UnrecognizedParameterPrefix { location, .. }
            | Error::BadInputType { location, .. }
            | Error::BadOutputType { location, .. }
            | Error::ParameterNotFound { location, .. }
            | Error::ColumnNotFound { location, .. }
            | Error::ParameterAlreadyBound { location, .. }
            | Error::StatementNotExecuted { location, .. }
            | Error::NotASelect { location, .. }
            | Error::NoCurrentRow { location }
            | Error::NoMemory { location, .. }
            | Error::OsApiFailed { location, .. }
            | Error::TypeConversion { location, .. }
            | Error::Internal { location, .. } => location,
        }
    }

    /// Broad origin of the error.
    pub fn error_type(&self) -> ErrorType {
        match self {
            Error::NativeCallFailed { .. } | Error::EnvironmentCreateFailed { .. } => {
                ErrorType::Oracle
            }
            Error::OsApiFailed { .. } => ErrorType::OsApi,
            _ => ErrorType::OraLib,
        }
    }

    /// Native status of a failed call, if this error came from one.
    pub fn status(&self) -> Option<Status> {
        match self {
            Error::NativeCallFailed { status, .. } | Error::EnvironmentCreateFailed { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// ORA- error number of a failed native call.
    pub fn ora_code(&self) -> Option<i32> {
        match self {
            Error::NativeCallFailed { code, .. } if *code != 0 => Some(*code),
            _ => None,
        }
    }

    /// Multi-line diagnostic block with location, error type and description.
    pub fn details(&self) -> String {
        let location = self.location();
        let mut out = String::new();
        let _ = writeln!(out, "Source: {}, line {}", location.file(), location.line());
        let _ = writeln!(out, "Error type: {}", self.error_type());
        let _ = writeln!(out, "Description: {}", self);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_error_display() {
        let err = Error::native(Status::Error, 942, "ORA-00942: table or view does not exist\n")
            .with_context(":nId");
        assert_eq!(
            err.to_string(),
            "(OCI_ERROR) ORA-00942: table or view does not exist [:nId]"
        );
        assert_eq!(err.ora_code(), Some(942));
        assert_eq!(err.status(), Some(Status::Error));
    }

    #[test]
    fn test_native_error_without_record() {
        let err = Error::native(Status::InvalidHandle, 0, "");
        assert_eq!(err.to_string(), "(OCI_INVALID_HANDLE)");
        assert_eq!(err.ora_code(), None);
    }

    #[test]
    fn test_error_types() {
        assert_eq!(Error::environment_create_failed(Status::Error).error_type(), ErrorType::Oracle);
        assert_eq!(Error::internal("x").error_type(), ErrorType::OraLib);
        let os = Error::os_api(io::Error::new(io::ErrorKind::Other, "no host"));
        assert_eq!(os.error_type(), ErrorType::OsApi);
    }

    #[test]
    fn test_details_block() {
        let err = Error::column_not_found("SALARY");
        let details = err.details();
        let lines: Vec<&str> = details.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Source: "));
        assert!(lines[0].contains("error.rs"));
        assert_eq!(lines[1], "Error type: OraLib");
        assert_eq!(lines[2], "Description: (EC_COLUMN_NOT_FOUND) Column not found: SALARY");
    }

    #[test]
    fn test_bad_output_null_message() {
        let err = Error::null_output("NAME", ValueKind::Text, "text");
        assert_eq!(err.to_string(), "(EC_BAD_OUTPUT_TYPE) NAME is NULL and cannot be read as text");
    }
}
