//! Select-list metadata read from the native describe calls.

use crate::error::Result;
use crate::native::{native_error, CallInterface, Handle, NativeResult};

/// Describe output for one select-list position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    /// Column name, exact case.
    pub name: String,
    /// 1-based position.
    pub position: usize,
    /// Native data type code.
    pub type_code: u16,
    /// Maximum size in bytes.
    pub max_size: u32,
}

impl ColumnDescription {
    /// Read name, type and size of `position` through its parameter descriptor.
    ///
    /// The descriptor is freed whether or not the reads succeed.
    pub(crate) fn read(
        ci: &dyn CallInterface,
        stmt: Handle,
        err: Handle,
        position: usize,
    ) -> Result<Self> {
        let descriptor = ci
            .param_get(stmt, err, position as u32)
            .map_err(|status| native_error(ci, err, status))?;
        let attributes = (|| -> NativeResult<(String, u16, u32)> {
            let name = ci.param_name(descriptor, err)?;
            let type_code = ci.param_data_type(descriptor, err)?;
            let max_size = ci.param_data_size(descriptor, err)?;
            Ok((name, type_code, max_size))
        })()
        .map_err(|status| native_error(ci, err, status));
        let freed = ci.descriptor_free(descriptor);
        if !freed.is_success() {
            tracing::warn!(position, status = %freed, "failed to free parameter descriptor");
        }
        let (name, type_code, max_size) = attributes?;
        Ok(Self {
            name,
            position,
            type_code,
            max_size,
        })
    }
}
