//! Oracle NUMBER codec.
//!
//! Oracle NUMBER is a variable-length format where:
//! - First byte is exponent (with sign info in high bit)
//! - Remaining bytes are base-100 digits of mantissa
//!
//! Positive numbers store `digit + 1`; negative numbers store `101 - digit`
//! with inverted exponent bits and a trailing `102` byte when the mantissa is
//! shorter than 20 bytes. Zero is the single byte `0x80`.
//!
//! The VARNUM wire form used by binds and defines prefixes the bytes with
//! their length.

use crate::error::{Error, Result};
use crate::native::constants::VARNUM_SIZE;

const MAX_MANTISSA_BYTES: usize = 20;
const NEGATIVE_TERMINATOR: u8 = 102;
const MIN_EXPONENT: i32 = -65;
const MAX_EXPONENT: i32 = 62;
const MAX_POINT: i64 = 1000;

/// Decode Oracle NUMBER format to string.
///
/// Preserves full precision by returning the number as a string.
pub fn decode_oracle_number(bytes: &[u8]) -> Result<String> {
    let (&exp_byte, mantissa) = bytes
        .split_first()
        .ok_or_else(|| Error::type_conversion("empty NUMBER value"))?;
    let is_positive = exp_byte & 0x80 != 0;

    if mantissa.is_empty() {
        return if exp_byte == 0x80 {
            Ok("0".to_string())
        } else {
            Err(Error::type_conversion("NUMBER value is infinite"))
        };
    }

    let exponent = if is_positive {
        exp_byte as i32 - 193
    } else {
        (!exp_byte) as i32 - 193
    };

    let mantissa = match mantissa.split_last() {
        Some((&NEGATIVE_TERMINATOR, rest)) if !is_positive => rest,
        _ => mantissa,
    };

    let mut digits = Vec::with_capacity(mantissa.len() * 2);
    for &byte in mantissa {
        let pair = if is_positive {
            byte as i32 - 1
        } else {
            101 - byte as i32
        };
        if !(0..=99).contains(&pair) {
            return Err(Error::type_conversion(format!(
                "invalid NUMBER mantissa byte {:#04x}",
                byte
            )));
        }
        digits.push((pair / 10) as u8);
        digits.push((pair % 10) as u8);
    }

    // Position of the decimal point within `digits`
    let mut point = (exponent + 1) * 2;
    let leading = digits.iter().take_while(|&&d| d == 0).count();
    digits.drain(..leading);
    point -= leading as i32;
    while digits.last() == Some(&0) {
        digits.pop();
    }
    if digits.is_empty() {
        return Ok("0".to_string());
    }

    let mut result = String::with_capacity(digits.len() + 4);
    if !is_positive {
        result.push('-');
    }
    let to_char = |d: &u8| (b'0' + d) as char;
    if point <= 0 {
        result.push_str("0.");
        result.extend(std::iter::repeat('0').take((-point) as usize));
        result.extend(digits.iter().map(to_char));
    } else if point as usize >= digits.len() {
        result.extend(digits.iter().map(to_char));
        result.extend(std::iter::repeat('0').take(point as usize - digits.len()));
    } else {
        let (int_part, frac_part) = digits.split_at(point as usize);
        result.extend(int_part.iter().map(to_char));
        result.push('.');
        result.extend(frac_part.iter().map(to_char));
    }
    Ok(result)
}

/// Split a decimal literal into sign, significant digits and decimal point position.
///
/// The value is `0.d1d2d3... * 10^point`.
fn parse_decimal(text: &str) -> Result<(bool, Vec<u8>, i32)> {
    let invalid = || Error::type_conversion(format!("invalid number literal '{}'", text));
    let trimmed = text.trim();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let (mantissa, exp10) = match unsigned.find(['e', 'E']) {
        Some(idx) => {
            let exp: i32 = unsigned[idx + 1..].parse().map_err(|_| invalid())?;
            (&unsigned[..idx], exp)
        }
        None => (unsigned, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    let mut digits = Vec::with_capacity(int_part.len() + frac_part.len());
    for c in int_part.chars().chain(frac_part.chars()) {
        let d = c.to_digit(10).ok_or_else(invalid)?;
        digits.push(d as u8);
    }
    let leading = digits.iter().take_while(|&&d| d == 0).count();
    digits.drain(..leading);
    let point = int_part.len() as i64 + i64::from(exp10) - leading as i64;
    // far outside any NUMBER exponent, keeps the pair alignment below in range
    if !digits.is_empty() && point.abs() > MAX_POINT {
        return Err(out_of_range(text));
    }
    let point = if digits.is_empty() { 0 } else { point as i32 };
    while digits.last() == Some(&0) {
        digits.pop();
    }
    Ok((negative, digits, point))
}

fn out_of_range(text: &str) -> Error {
    Error::type_conversion(format!("number {} is outside the NUMBER range", text))
}

/// Encode a decimal literal in Oracle NUMBER format.
///
/// Accepts an optional sign, a decimal point and an `e` exponent. Values
/// with more than 40 significant digits are rounded half up.
pub fn encode_oracle_number(text: &str) -> Result<Vec<u8>> {
    let (negative, mut digits, mut point) = parse_decimal(text)?;
    if digits.is_empty() {
        return Ok(vec![0x80]);
    }

    // Align the decimal point on a base-100 boundary
    if point.rem_euclid(2) == 1 {
        digits.insert(0, 0);
        point += 1;
    }
    if digits.len() % 2 == 1 {
        digits.push(0);
    }
    let mut exponent = point / 2 - 1;
    let mut pairs: Vec<u8> = digits.chunks(2).map(|p| p[0] * 10 + p[1]).collect();

    if pairs.len() > MAX_MANTISSA_BYTES {
        let round_up = pairs[MAX_MANTISSA_BYTES] >= 50;
        pairs.truncate(MAX_MANTISSA_BYTES);
        if round_up {
            let mut carry = true;
            for pair in pairs.iter_mut().rev() {
                if *pair == 99 {
                    *pair = 0;
                } else {
                    *pair += 1;
                    carry = false;
                    break;
                }
            }
            if carry {
                pairs.insert(0, 1);
                pairs.truncate(MAX_MANTISSA_BYTES);
                exponent += 1;
            }
        }
    }
    while pairs.last() == Some(&0) {
        pairs.pop();
    }

    if !(MIN_EXPONENT..=MAX_EXPONENT).contains(&exponent) {
        return Err(out_of_range(text));
    }

    let mut bytes = Vec::with_capacity(pairs.len() + 2);
    if negative {
        bytes.push((62 - exponent) as u8);
        bytes.extend(pairs.iter().map(|p| 101 - p));
        if pairs.len() < MAX_MANTISSA_BYTES {
            bytes.push(NEGATIVE_TERMINATOR);
        }
    } else {
        bytes.push((193 + exponent) as u8);
        bytes.extend(pairs.iter().map(|p| p + 1));
    }
    Ok(bytes)
}

/// Decode a VARNUM slot (length byte followed by NUMBER bytes).
pub fn decode_varnum(slot: &[u8]) -> Result<String> {
    let (&len, rest) = slot
        .split_first()
        .ok_or_else(|| Error::type_conversion("empty VARNUM slot"))?;
    let bytes = rest
        .get(..len as usize)
        .filter(|b| !b.is_empty())
        .ok_or_else(|| Error::type_conversion(format!("invalid VARNUM length {}", len)))?;
    decode_oracle_number(bytes)
}

/// Encode a decimal literal into a VARNUM slot.
pub fn encode_varnum(text: &str, slot: &mut [u8]) -> Result<()> {
    let bytes = encode_oracle_number(text)?;
    if slot.len() < VARNUM_SIZE || bytes.len() >= VARNUM_SIZE {
        return Err(Error::internal(format!(
            "VARNUM slot of {} bytes cannot hold {} bytes",
            slot.len(),
            bytes.len() + 1
        )));
    }
    slot[0] = bytes.len() as u8;
    slot[1..=bytes.len()].copy_from_slice(&bytes);
    slot[bytes.len() + 1..].fill(0);
    Ok(())
}

/// Decimal literal for an `f64`.
pub fn f64_to_decimal(value: f64) -> Result<String> {
    if !value.is_finite() {
        return Err(Error::type_conversion(format!(
            "{} cannot be stored as NUMBER",
            value
        )));
    }
    Ok(value.to_string())
}

/// Parse a decoded number as `f64`.
pub fn decimal_to_f64(text: &str) -> Result<f64> {
    text.parse()
        .map_err(|_| Error::type_conversion(format!("'{}' is not a valid f64", text)))
}

/// Parse a decoded number as `i64`, truncating any fractional part toward zero.
pub fn decimal_to_i64(text: &str) -> Result<i64> {
    let int_part = text.split_once('.').map_or(text, |(int, _)| int);
    match int_part {
        "" | "-" | "-0" => Ok(0),
        _ => int_part
            .parse()
            .map_err(|_| Error::type_conversion(format!("{} does not fit in i64", text))),
    }
}
