//! Packed 5-byte KDB timestamps.
//!
//! Bit layout (big-endian across the five bytes):
//!
//! ```text
//! year:14 | month:4 | day:5 | hour:5 | minute:6 | second:6
//! ```
//!
//! The reader takes all 14 year bits; the writer only produces years
//! `0..=4095` and rejects anything else.
//! "Never" (no expiry) is the sentinel `2999-12-28 23:59:59`.

use anyhow::{anyhow, bail, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// Encoded size of one timestamp.
pub const PACKED_TIME_LEN: usize = 5;

/// The "never" sentinel, already packed.
pub const NEVER: [u8; PACKED_TIME_LEN] = pack_parts(2999, 12, 28, 23, 59, 59);

const fn pack_parts(year: u32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> [u8; 5] {
    [
        ((year >> 6) & 0x3F) as u8,
        (((year & 0x3F) << 2) | ((month >> 2) & 0x03)) as u8,
        (((month & 0x03) << 6) | ((day & 0x1F) << 1) | ((hour >> 4) & 0x01)) as u8,
        (((hour & 0x0F) << 4) | ((minute >> 2) & 0x0F)) as u8,
        (((minute & 0x03) << 6) | (second & 0x3F)) as u8,
    ]
}

/// Largest year the packed format stores.
pub const MAX_YEAR: i32 = 4095;

/// Pack a timestamp; `None` packs as [`NEVER`]. Sub-second precision is dropped.
///
/// Fails for years outside `0..=`[`MAX_YEAR`].
pub fn pack(t: Option<NaiveDateTime>) -> Result<[u8; PACKED_TIME_LEN]> {
    let Some(t) = t else { return Ok(NEVER) };
    if !(0..=MAX_YEAR).contains(&t.year()) {
        bail!("year {} does not fit a packed time (0..={MAX_YEAR})", t.year());
    }
    Ok(pack_parts(t.year().unsigned_abs(), t.month(), t.day(), t.hour(), t.minute(), t.second()))
}

/// Unpack a timestamp; [`NEVER`] unpacks as `None`.
///
/// Fails if the fields do not form a valid calendar date and time.
pub fn unpack(b: [u8; PACKED_TIME_LEN]) -> Result<Option<NaiveDateTime>> {
    let [b1, b2, b3, b4, b5] = b.map(u32::from);

    let year = (b1 << 6) | (b2 >> 2);
    let month = ((b2 & 0x03) << 2) | (b3 >> 6);
    let day = (b3 >> 1) & 0x1F;
    let hour = ((b3 & 0x01) << 4) | (b4 >> 4);
    let minute = ((b4 & 0x0F) << 2) | (b5 >> 6);
    let second = b5 & 0x3F;

    if (year, month, day, hour, minute, second) == (2999, 12, 28, 23, 59, 59) {
        return Ok(None);
    }

    // year ≤ 2^14, always fits an i32
    let y = i32::try_from(year)?;
    NaiveDate::from_ymd_opt(y, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .map(Some)
        .ok_or_else(|| {
            anyhow!(
                "invalid packed time {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
            )
        })
}

/// Unpack from a field slice (must be exactly [`PACKED_TIME_LEN`] bytes).
pub fn unpack_slice(data: &[u8]) -> Result<Option<NaiveDateTime>> {
    let arr: [u8; PACKED_TIME_LEN] = data
        .try_into()
        .map_err(|_| anyhow!("packed time must be {PACKED_TIME_LEN} bytes, got {}", data.len()))?;
    unpack(arr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d).unwrap().and_hms_opt(h, mi, s).unwrap()
    }

    #[test]
    fn never_is_none() {
        assert_eq!(pack(None).unwrap(), NEVER);
        assert_eq!(unpack(NEVER).unwrap(), None);
    }

    #[test]
    fn roundtrip_edges() {
        for t in [
            dt(2012, 1, 1, 0, 0, 0),
            dt(2024, 2, 29, 23, 59, 59),
            dt(1999, 12, 31, 17, 30, 5),
            dt(4095, 6, 15, 12, 0, 1),
        ] {
            assert_eq!(unpack(pack(Some(t)).unwrap()).unwrap(), Some(t), "{t}");
        }
    }

    #[test]
    fn known_encoding() {
        // 2010-07-14 16:45:30
        let b = pack(Some(dt(2010, 7, 14, 16, 45, 30))).unwrap();
        assert_eq!(b, [0x1F, 0x69, 0xDD, 0x0B, 0x5E]);
    }

    #[test]
    fn out_of_range_years_are_errors() {
        assert!(pack(Some(dt(4096, 1, 1, 0, 0, 0))).is_err());
        assert!(pack(Some(dt(-1, 1, 1, 0, 0, 0))).is_err());
        assert!(pack(Some(dt(0, 1, 1, 0, 0, 0))).is_ok());
    }

    #[test]
    fn rejects_invalid_calendar() {
        // month 0
        assert!(unpack([0x1F, 0x68, 0x1C, 0x00, 0x00]).is_err());
        assert!(unpack_slice(&[0u8; 4]).is_err());
    }
}
