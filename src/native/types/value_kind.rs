//! Value kinds and their native wire layouts.
//!
//! A [`Layout`] is resolved once, when a column is described or a parameter
//! is bound, and fixes the wire type and per-row element size of the
//! buffers for the lifetime of the owner.

use crate::error::{Error, Result};
use crate::native::constants::*;
use std::fmt;

/// Logical kind of a value moving through a column or parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Never valid once a column or parameter is set up.
    Unknown,
    Number,
    Date,
    Text,
    /// Nested statement (ref cursor).
    Cursor,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Unknown => "unknown",
            ValueKind::Number => "number",
            ValueKind::Date => "date",
            ValueKind::Text => "text",
            ValueKind::Cursor => "cursor",
        };
        f.write_str(name)
    }
}

/// In-memory representation exchanged with the native layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    /// Length-prefixed NUMBER bytes.
    VarNum,
    /// 7-byte DATE record.
    Date,
    /// Null-terminated string.
    String,
    /// Nested statement handle.
    NestedStatement,
}

impl WireType {
    /// External data type code passed to bind and define calls.
    pub fn code(self) -> u16 {
        match self {
            WireType::VarNum => SQLT_VNU,
            WireType::Date => SQLT_DAT,
            WireType::String => SQLT_STR,
            WireType::NestedStatement => SQLT_RSET,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            SQLT_VNU => Some(WireType::VarNum),
            SQLT_DAT => Some(WireType::Date),
            SQLT_STR => Some(WireType::String),
            SQLT_RSET => Some(WireType::NestedStatement),
            _ => None,
        }
    }
}

/// Value kind, wire type and element size of one buffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub kind: ValueKind,
    pub wire: WireType,
    pub element_size: usize,
}

impl Layout {
    /// Layout for `kind`; `max_chars` only matters for text.
    ///
    /// Returns `None` for [`ValueKind::Unknown`].
    pub fn for_kind(kind: ValueKind, max_chars: usize) -> Option<Self> {
        let (wire, element_size) = match kind {
            ValueKind::Number => (WireType::VarNum, VARNUM_SIZE),
            ValueKind::Date => (WireType::Date, DATE_SIZE),
            ValueKind::Text => (WireType::String, (max_chars + 1) * TEXT_CHAR_WIDTH),
            ValueKind::Cursor => (WireType::NestedStatement, HANDLE_SLOT_SIZE),
            ValueKind::Unknown => return None,
        };
        Some(Self {
            kind,
            wire,
            element_size,
        })
    }

    /// Text buffers carry a returned-length array next to the data.
    pub fn has_lengths(&self) -> bool {
        self.kind == ValueKind::Text
    }
}

/// Resolve the layout of a described column.
pub fn resolve_native(name: &str, type_code: u16, max_size: u32) -> Result<Layout> {
    let kind = match type_code {
        SQLT_INT | SQLT_UIN | SQLT_NUM | SQLT_FLT | SQLT_VNU | SQLT_PDN => ValueKind::Number,
        SQLT_DAT | SQLT_ODT => ValueKind::Date,
        SQLT_CHR | SQLT_STR | SQLT_VCS | SQLT_AFC | SQLT_AVC | SQLT_VST => ValueKind::Text,
        SQLT_LNG => {
            // LONG reports no usable maximum
            return Layout::for_kind(ValueKind::Text, LONG_FETCH_BYTES)
                .ok_or_else(|| Error::internal("text layout"));
        }
        SQLT_RSET | SQLT_CUR => ValueKind::Cursor,
        _ => return Err(Error::unsupported_native_type(name, type_code)),
    };
    Layout::for_kind(kind, max_size as usize).ok_or_else(|| Error::internal("unresolved value kind"))
}

/// Kind and array marker inferred from a bind name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterType {
    pub kind: ValueKind,
    pub is_array: bool,
}

fn strip_array_marker(name: &str) -> (bool, &str) {
    let bare = name.strip_prefix(BIND_SIGIL).unwrap_or(name);
    match bare.strip_prefix(PREFIX_ARRAY) {
        Some(rest) => (true, rest),
        None => (false, bare),
    }
}

/// True when the name carries the `t` array marker after the optional sigil.
pub fn has_array_marker(name: &str) -> bool {
    strip_array_marker(name).0
}

/// Infer a parameter's kind from its name: `[:][t]<n|d|s|c><rest>`.
pub fn infer_parameter(name: &str) -> Result<ParameterType> {
    let (is_array, rest) = strip_array_marker(name);
    let kind = match rest.chars().next() {
        Some(PREFIX_NUMBER) => ValueKind::Number,
        Some(PREFIX_DATE) => ValueKind::Date,
        Some(PREFIX_TEXT) => ValueKind::Text,
        Some(PREFIX_CURSOR) => ValueKind::Cursor,
        _ => return Err(Error::unrecognized_prefix(name)),
    };
    Ok(ParameterType { kind, is_array })
}

/// Bind name as reported by the client: always carries the `:` sigil.
pub fn normalize_bind_name(name: &str) -> String {
    if name.starts_with(BIND_SIGIL) {
        name.to_string()
    } else {
        format!("{}{}", BIND_SIGIL, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_numeric_codes() {
        for code in [SQLT_INT, SQLT_UIN, SQLT_NUM, SQLT_FLT, SQLT_VNU, SQLT_PDN] {
            let layout = resolve_native("N", code, 22).unwrap();
            assert_eq!(layout.kind, ValueKind::Number);
            assert_eq!(layout.wire, WireType::VarNum);
            assert_eq!(layout.element_size, 22);
        }
    }

    #[test]
    fn test_resolve_date_codes() {
        for code in [SQLT_DAT, SQLT_ODT] {
            let layout = resolve_native("D", code, 7).unwrap();
            assert_eq!(layout.kind, ValueKind::Date);
            assert_eq!(layout.element_size, 7);
        }
    }

    #[test]
    fn test_resolve_text_size_includes_terminator() {
        let layout = resolve_native("NAME", SQLT_CHR, 30).unwrap();
        assert_eq!(layout.kind, ValueKind::Text);
        assert_eq!(layout.wire, WireType::String);
        assert_eq!(layout.element_size, 31);
        assert!(layout.has_lengths());
    }

    #[test]
    fn test_resolve_long_is_capped() {
        let layout = resolve_native("NOTES", SQLT_LNG, 0).unwrap();
        assert_eq!(layout.kind, ValueKind::Text);
        assert_eq!(layout.element_size, LONG_FETCH_BYTES + 1);
    }

    #[test]
    fn test_resolve_cursor() {
        let layout = resolve_native("C", SQLT_RSET, 0).unwrap();
        assert_eq!(layout.kind, ValueKind::Cursor);
        assert_eq!(layout.element_size, std::mem::size_of::<usize>());
    }

    #[test]
    fn test_resolve_unsupported_names_column() {
        let err = resolve_native("PHOTO", 113, 4000).unwrap_err();
        match err {
            Error::UnsupportedNativeType { name, type_code, .. } => {
                assert_eq!(name, "PHOTO");
                assert_eq!(type_code, 113);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_infer_prefixes() {
        let cases = [
            (":nAge", ValueKind::Number, false),
            (":sName", ValueKind::Text, false),
            (":dBirth", ValueKind::Date, false),
            (":cRows", ValueKind::Cursor, false),
            ("nAge", ValueKind::Number, false),
            (":tnIds", ValueKind::Number, true),
            ("tsNames", ValueKind::Text, true),
        ];
        for (name, kind, is_array) in cases {
            let inferred = infer_parameter(name).unwrap();
            assert_eq!(inferred, ParameterType { kind, is_array }, "{name}");
        }
    }

    #[test]
    fn test_array_marker_without_kind_character() {
        assert!(has_array_marker(":tnIds"));
        assert!(has_array_marker("tAmounts"));
        assert!(!has_array_marker(":amount"));
        assert!(!has_array_marker(":nTotal"));
    }

    #[test]
    fn test_infer_rejects_unknown_prefix() {
        for name in [":xFoo", ":", "", ":t", ":tx", ":Nage"] {
            assert!(
                matches!(infer_parameter(name), Err(Error::UnrecognizedParameterPrefix { .. })),
                "{name}"
            );
        }
    }

    #[test]
    fn test_normalize_bind_name() {
        assert_eq!(normalize_bind_name("nAge"), ":nAge");
        assert_eq!(normalize_bind_name(":nAge"), ":nAge");
    }
}
