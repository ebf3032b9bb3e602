//! Time helpers
//!
//! 全部时间戳统一使用 Unix 毫秒 (i64) 存储。

use chrono::{NaiveDate, TimeZone, Utc};

/// Current Unix timestamp in milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parse a `YYYY-MM-DD` date into Unix millis at UTC midnight
pub fn parse_date_millis(s: &str) -> Option<i64> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    let dt = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&dt).timestamp_millis())
}

/// Parse a `YYYY-MM-DD` date into Unix millis at the end of that day (exclusive upper bound)
pub fn parse_date_end_millis(s: &str) -> Option<i64> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    let next = date.succ_opt()?;
    let dt = next.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&dt).timestamp_millis())
}
