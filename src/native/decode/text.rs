//! Null-terminated text codec.

use crate::error::{Error, Result};

/// Copy `value` into `slot` as a null-terminated string.
///
/// Text longer than `slot.len() - 1` bytes is cut at the last UTF-8
/// character boundary that fits. Returns the number of bytes written,
/// excluding the terminator.
pub fn encode_text(value: &str, slot: &mut [u8]) -> usize {
    let Some(capacity) = slot.len().checked_sub(1) else {
        return 0;
    };
    let mut end = value.len().min(capacity);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    slot[..end].copy_from_slice(&value.as_bytes()[..end]);
    slot[end] = 0;
    end
}

/// Read a null-terminated string from `slot`.
///
/// `length` is the returned length when the native layer reports one; the
/// first NUL byte ends the string either way.
pub fn decode_text(slot: &[u8], length: Option<usize>) -> Result<String> {
    let limit = length.map_or(slot.len(), |len| len.min(slot.len()));
    let bytes = &slot[..limit];
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end])
        .map(str::to_string)
        .map_err(|e| Error::type_conversion(format!("text is not valid UTF-8: {}", e)))
}
