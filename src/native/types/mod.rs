//! Value domain: kinds, wire layouts, buffers and decoded values.

mod batch;
mod metadata;
mod value;
mod value_kind;

pub use batch::BatchBuffer;
pub use metadata::ColumnDescription;
pub use value::OracleValue;
pub use value_kind::{
    has_array_marker, infer_parameter, normalize_bind_name, resolve_native, Layout, ParameterType,
    ValueKind, WireType,
};
