//! Daily upload counters and per-user limits.
//!
//! Counters are keyed by user and calendar day and are created lazily on
//! first use. The `_on` variants run on a connection the caller already
//! holds so admission can read and increment inside one transaction.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DatabaseError};

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// Uploads already counted for the user on `day`.
pub(crate) fn used_on(conn: &Connection, user_id: &str, day: NaiveDate) -> Result<u32, DatabaseError> {
    let used = conn
        .query_row(
            "SELECT upload_count FROM upload_quotas WHERE user_id = ?1 AND day = ?2",
            params![user_id, day_key(day)],
            |r| r.get(0),
        )
        .optional()?;
    Ok(used.unwrap_or(0))
}

/// The user's daily limit, or `default_limit` when no override exists.
pub(crate) fn daily_limit_on(
    conn: &Connection,
    user_id: &str,
    default_limit: u32,
) -> Result<u32, DatabaseError> {
    let limit = conn
        .query_row(
            "SELECT daily_limit FROM user_limits WHERE user_id = ?1",
            params![user_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(limit.unwrap_or(default_limit))
}

/// Adds `count` uploads to the user's counter for `day`, creating it first
/// if needed. Returns the new total.
pub(crate) fn increment_on(
    conn: &Connection,
    user_id: &str,
    day: NaiveDate,
    count: u32,
) -> Result<u32, DatabaseError> {
    let key = day_key(day);
    conn.execute(
        "INSERT OR IGNORE INTO upload_quotas (user_id, day, upload_count) VALUES (?1, ?2, 0)",
        params![user_id, key],
    )?;
    conn.execute(
        "UPDATE upload_quotas SET upload_count = upload_count + ?3 WHERE user_id = ?1 AND day = ?2",
        params![user_id, key, count],
    )?;
    let total = conn.query_row(
        "SELECT upload_count FROM upload_quotas WHERE user_id = ?1 AND day = ?2",
        params![user_id, key],
        |r| r.get(0),
    )?;
    Ok(total)
}

pub fn used(db: &Database, user_id: &str, day: NaiveDate) -> Result<u32, DatabaseError> {
    db.with_conn(|conn| used_on(conn, user_id, day))
}

pub fn daily_limit(db: &Database, user_id: &str, default_limit: u32) -> Result<u32, DatabaseError> {
    db.with_conn(|conn| daily_limit_on(conn, user_id, default_limit))
}

/// Uploads the user may still submit on `day`, never negative.
pub fn remaining(
    db: &Database,
    user_id: &str,
    day: NaiveDate,
    default_limit: u32,
) -> Result<u32, DatabaseError> {
    db.with_conn(|conn| {
        let limit = daily_limit_on(conn, user_id, default_limit)?;
        let used = used_on(conn, user_id, day)?;
        Ok(limit.saturating_sub(used))
    })
}

/// Sets a per-user override of the daily limit.
pub fn set_daily_limit(db: &Database, user_id: &str, limit: u32) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO user_limits (user_id, daily_limit) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET daily_limit = excluded.daily_limit",
            params![user_id, limit],
        )?;
        Ok(())
    })
}
