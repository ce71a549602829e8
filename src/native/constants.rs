//! Call-level interface constants.
//!
//! Numeric values match the ones the native OCI headers define, so a linked
//! implementation of [`CallInterface`](super::CallInterface) can forward them
//! unchanged.

// Status codes
pub const OCI_SUCCESS: i32 = 0;
pub const OCI_SUCCESS_WITH_INFO: i32 = 1;
pub const OCI_NEED_DATA: i32 = 99;
pub const OCI_NO_DATA: i32 = 100;
pub const OCI_ERROR: i32 = -1;
pub const OCI_INVALID_HANDLE: i32 = -2;
pub const OCI_STILL_EXECUTING: i32 = -3123;
pub const OCI_CONTINUE: i32 = -24200;

// Handle types
pub const OCI_HTYPE_ENV: u32 = 1;
pub const OCI_HTYPE_ERROR: u32 = 2;
pub const OCI_HTYPE_SVCCTX: u32 = 3;
pub const OCI_HTYPE_STMT: u32 = 4;
pub const OCI_HTYPE_BIND: u32 = 5;
pub const OCI_HTYPE_DEFINE: u32 = 6;
pub const OCI_HTYPE_SERVER: u32 = 8;
pub const OCI_HTYPE_SESSION: u32 = 9;
pub const OCI_DTYPE_PARAM: u32 = 53;

// External data types
pub const SQLT_CHR: u16 = 1;
pub const SQLT_NUM: u16 = 2;
pub const SQLT_INT: u16 = 3;
pub const SQLT_FLT: u16 = 4;
pub const SQLT_STR: u16 = 5;
pub const SQLT_VNU: u16 = 6;
pub const SQLT_PDN: u16 = 7;
pub const SQLT_LNG: u16 = 8;
pub const SQLT_VCS: u16 = 9;
pub const SQLT_DAT: u16 = 12;
pub const SQLT_UIN: u16 = 68;
pub const SQLT_AFC: u16 = 96;
pub const SQLT_AVC: u16 = 97;
pub const SQLT_CUR: u16 = 102;
pub const SQLT_RSET: u16 = 116;
pub const SQLT_VST: u16 = 155;
pub const SQLT_ODT: u16 = 156;

// Attributes
pub const OCI_ATTR_DATA_SIZE: u32 = 1;
pub const OCI_ATTR_DATA_TYPE: u32 = 2;
pub const OCI_ATTR_NAME: u32 = 4;
pub const OCI_ATTR_NONBLOCKING_MODE: u32 = 3;
pub const OCI_ATTR_SERVER: u32 = 6;
pub const OCI_ATTR_SESSION: u32 = 7;
pub const OCI_ATTR_ROW_COUNT: u32 = 9;
pub const OCI_ATTR_PARAM_COUNT: u32 = 18;
pub const OCI_ATTR_USERNAME: u32 = 22;
pub const OCI_ATTR_PASSWORD: u32 = 23;
pub const OCI_ATTR_STMT_TYPE: u32 = 24;
pub const OCI_ATTR_CHARSET_ID: u32 = 31;
pub const OCI_ATTR_MODULE: u32 = 366;
pub const OCI_ATTR_CLIENT_INFO: u32 = 368;

// Statement types
pub const OCI_STMT_SELECT: u16 = 1;
pub const OCI_STMT_UPDATE: u16 = 2;
pub const OCI_STMT_DELETE: u16 = 3;
pub const OCI_STMT_INSERT: u16 = 4;
pub const OCI_STMT_CREATE: u16 = 5;
pub const OCI_STMT_DROP: u16 = 6;
pub const OCI_STMT_ALTER: u16 = 7;
pub const OCI_STMT_BEGIN: u16 = 8;
pub const OCI_STMT_DECLARE: u16 = 9;

// Character set id for AL32UTF8
pub const AL32UTF8_CHARSET_ID: u16 = 873;

// Null indicator values
pub const INDICATOR_PRESENT: i16 = 0;
pub const INDICATOR_NULL: i16 = -1;

/// Size in bytes of a VARNUM value (length byte plus up to 21 number bytes).
pub const VARNUM_SIZE: usize = 22;
/// Size in bytes of a DATE value.
pub const DATE_SIZE: usize = 7;
/// Bytes per character in text buffers (AL32UTF8 byte units).
pub const TEXT_CHAR_WIDTH: usize = 1;
/// Size in bytes of a nested statement handle slot.
pub const HANDLE_SLOT_SIZE: usize = std::mem::size_of::<usize>();

// Client-side limits
pub const DEFAULT_FETCH_SIZE: u32 = 100;
pub const MAX_OUTPUT_TEXT_BYTES: usize = 4096;
pub const LONG_FETCH_BYTES: usize = 32760;

/// Ordinal of the first column and the first parameter.
pub const FIRST_INDEX: usize = 1;

// Bind name convention: [:][t]<kind><name>
pub const BIND_SIGIL: char = ':';
pub const PREFIX_ARRAY: char = 't';
pub const PREFIX_NUMBER: char = 'n';
pub const PREFIX_DATE: char = 'd';
pub const PREFIX_TEXT: char = 's';
pub const PREFIX_CURSOR: char = 'c';
