//! Wire-format codecs for bound and defined buffers.
//!
//! | Value kind | Wire type | Module |
//! |------------|-----------|--------|
//! | Number     | VARNUM    | `number` |
//! | Date       | DATE      | `date` |
//! | Text       | STRING    | `text` |

mod date;
mod number;
mod text;

pub use date::{decode_oracle_date, encode_oracle_date};
pub use number::{
    decimal_to_f64, decimal_to_i64, decode_oracle_number, decode_varnum, encode_oracle_number,
    encode_varnum, f64_to_decimal,
};
pub use text::{decode_text, encode_text};
