//! CIM datetime values
//!
//! Timestamps use the fixed layout `yyyymmddhhmmss.mmmmmmsutc`, where the
//! last four characters are a sign and the UTC offset in minutes. Intervals
//! (`ddddddddhhmmss.mmmmmm:000`) are not timestamps and are rejected.

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};

const TIMESTAMP_LEN: usize = 25;
const LOCAL_FORMAT: &str = "%Y%m%d%H%M%S%.6f";

/// Parse a CIM timestamp into an offset-aware datetime
pub fn parse_cim_datetime(value: &str) -> Result<DateTime<FixedOffset>> {
    let invalid = || Error::validation("CIM datetime", value);

    let value = value.trim();
    if value.len() != TIMESTAMP_LEN || !value.is_ascii() {
        return Err(invalid());
    }

    let (local, offset) = value.split_at(21);
    let sign = match &offset[..1] {
        "+" => 1,
        "-" => -1,
        _ => return Err(invalid()),
    };
    let minutes: i32 = offset[1..].parse().map_err(|_| invalid())?;
    let offset = FixedOffset::east_opt(sign * minutes * 60).ok_or_else(invalid)?;

    let naive = NaiveDateTime::parse_from_str(local, LOCAL_FORMAT).map_err(|_| invalid())?;
    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(invalid)
}
