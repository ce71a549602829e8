//! Oracle DATE codec.
//!
//! Oracle DATE is encoded as 7 bytes:
//! - byte[0]: century + 100
//! - byte[1]: year (in century) + 100
//! - byte[2]: month (1-12)
//! - byte[3]: day (1-31)
//! - byte[4]: hour + 1 (0-23)
//! - byte[5]: minute + 1 (0-59)
//! - byte[6]: second + 1 (0-59)

use crate::error::{Error, Result};
use crate::native::constants::DATE_SIZE;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Decode an Oracle DATE from 7 bytes.
///
/// # Errors
/// Returns `Error::TypeConversion` if data is not exactly 7 bytes or contains invalid values.
pub fn decode_oracle_date(data: &[u8]) -> Result<NaiveDateTime> {
    let bytes: [u8; DATE_SIZE] = data.try_into().map_err(|_| {
        Error::type_conversion(format!(
            "DATE value must be exactly {} bytes, got {}",
            DATE_SIZE,
            data.len()
        ))
    })?;
    let [century, year, month, day, hour, minute, second] = bytes.map(i32::from);
    let year = (century - 100) * 100 + (year - 100);

    let date = NaiveDate::from_ymd_opt(year, month as u32, day as u32).ok_or_else(|| {
        Error::type_conversion(format!(
            "Invalid DATE: year={}, month={}, day={}",
            year, month, day
        ))
    })?;
    // Hour, minute and second are stored as value + 1
    let time = u32::try_from(hour - 1)
        .ok()
        .zip(u32::try_from(minute - 1).ok())
        .zip(u32::try_from(second - 1).ok())
        .and_then(|((h, m), s)| NaiveTime::from_hms_opt(h, m, s))
        .ok_or_else(|| {
            Error::type_conversion(format!(
                "Invalid TIME: hour={}, minute={}, second={}",
                hour - 1,
                minute - 1,
                second - 1
            ))
        })?;
    Ok(NaiveDateTime::new(date, time))
}

/// Encode a date/time as an Oracle DATE. Fractional seconds are dropped.
///
/// # Errors
/// Returns `Error::TypeConversion` for years outside 1..=9999.
pub fn encode_oracle_date(value: &NaiveDateTime) -> Result<[u8; DATE_SIZE]> {
    let year = value.year();
    if !(1..=9999).contains(&year) {
        return Err(Error::type_conversion(format!(
            "year {} is outside the DATE range",
            year
        )));
    }
    Ok([
        (year / 100 + 100) as u8,
        (year % 100 + 100) as u8,
        value.month() as u8,
        value.day() as u8,
        value.hour() as u8 + 1,
        value.minute() as u8 + 1,
        value.second() as u8 + 1,
    ])
}
