//! Histogram bucket statistics and the textual bound codec.
//!
//! Statistics store one bound per bucket as a single string: the bare value
//! for single-column indexes, `(v1, v2, ...)` for composite ones. Date,
//! datetime, and timestamp components are stored as packed unsigned integers
//! and must be unpacked before they can be used in a predicate.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{ColumnInfo, DataType};

/// One histogram bucket. The bucket ID is its position in the index's list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketStat {
    pub lower_bound: String,
    pub upper_bound: String,
    /// Rows with key <= `upper_bound`, counted from the start of the index.
    pub count: i64,
}

impl BucketStat {
    pub fn new(lower_bound: impl Into<String>, upper_bound: impl Into<String>, count: i64) -> Self {
        Self {
            lower_bound: lower_bound.into(),
            upper_bound: upper_bound.into(),
            count,
        }
    }
}

/// Total rows covered by a bucket list (the last cumulative count).
pub fn total_rows(buckets: &[BucketStat]) -> i64 {
    buckets.last().map(|b| b.count).unwrap_or(0)
}

/// Decode a bucket bound into one value per index column.
pub fn decode_bucket_bound(encoded: &str, columns: &[ColumnInfo]) -> Result<Vec<String>> {
    // NOTE: values containing "(", ")" or ", " are not representable here;
    // the statistics format has no escaping.
    let trimmed = encoded.trim_matches(|c| c == '(' || c == ')');
    let mut values: Vec<String> = trimmed.split(", ").map(str::to_string).collect();
    if values.len() != columns.len() {
        return Err(Error::MalformedBound(format!(
            "bound {encoded:?} has {} values, index has {} columns",
            values.len(),
            columns.len()
        )));
    }
    for (value, col) in values.iter_mut().zip(columns) {
        if col.data_type.is_packed_time() {
            *value = unpack_time(value, col.data_type)?;
        }
    }
    Ok(values)
}

/// Encode per-column values in the statistics bound format.
pub fn encode_bucket_bound(values: &[String], columns: &[ColumnInfo]) -> Result<String> {
    let mut parts = Vec::with_capacity(values.len());
    for (value, col) in values.iter().zip(columns) {
        if col.data_type.is_packed_time() {
            parts.push(pack_time(value)?.to_string());
        } else {
            parts.push(value.clone());
        }
    }
    if parts.len() == 1 {
        Ok(parts.remove(0))
    } else {
        Ok(format!("({})", parts.join(", ")))
    }
}

// Packed layout: ((((year * 13 + month) << 5 | day) << 17 | hms) << 24) | micros,
// with hms = hour << 12 | minute << 6 | second.
const MICROS_BITS: u32 = 24;
const HMS_BITS: u32 = 17;
const DAY_BITS: u32 = 5;

fn unpack_time(packed: &str, data_type: DataType) -> Result<String> {
    let packed: u64 = packed.trim().parse().map_err(|e| {
        Error::MalformedBound(format!("packed time {packed:?} is not an integer: {e}"))
    })?;
    let micros = packed & ((1 << MICROS_BITS) - 1);
    let ymdhms = packed >> MICROS_BITS;
    let ymd = ymdhms >> HMS_BITS;
    let hms = ymdhms & ((1 << HMS_BITS) - 1);
    let day = ymd & ((1 << DAY_BITS) - 1);
    let ym = ymd >> DAY_BITS;
    let (year, month) = (ym / 13, ym % 13);
    let (hour, minute, second) = (hms >> 12, (hms >> 6) & 0x3f, hms & 0x3f);

    if data_type == DataType::Date {
        return Ok(format!("{year:04}-{month:02}-{day:02}"));
    }
    let mut out = format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}");
    if micros > 0 {
        out.push_str(&format!(".{micros:06}"));
    }
    Ok(out)
}

fn pack_time(value: &str) -> Result<u64> {
    let bad = || Error::MalformedBound(format!("cannot pack time value {value:?}"));
    let (date, time) = match value.trim().split_once(' ') {
        Some((d, t)) => (d, Some(t)),
        None => (value.trim(), None),
    };
    let mut ymd = date.split('-').map(|p| p.parse::<u64>().map_err(|_| bad()));
    let (year, month, day) = match (ymd.next(), ymd.next(), ymd.next(), ymd.next()) {
        (Some(y), Some(m), Some(d), None) => (y?, m?, d?),
        _ => return Err(bad()),
    };
    let (mut hour, mut minute, mut second, mut micros) = (0u64, 0u64, 0u64, 0u64);
    if let Some(time) = time {
        let (hms, frac) = match time.split_once('.') {
            Some((h, f)) => (h, Some(f)),
            None => (time, None),
        };
        let mut it = hms.split(':').map(|p| p.parse::<u64>().map_err(|_| bad()));
        match (it.next(), it.next(), it.next(), it.next()) {
            (Some(h), Some(m), Some(s), None) => {
                hour = h?;
                minute = m?;
                second = s?;
            }
            _ => return Err(bad()),
        }
        if let Some(frac) = frac {
            // Right-pad to microseconds: ".5" is 500000us.
            let digits: String = frac.chars().chain(std::iter::repeat('0')).take(6).collect();
            micros = digits.parse().map_err(|_| bad())?;
        }
    }
    let ymd = ((year * 13 + month) << DAY_BITS) | day;
    let hms = (hour << 12) | (minute << 6) | second;
    Ok((((ymd << HMS_BITS) | hms) << MICROS_BITS) | micros)
}
