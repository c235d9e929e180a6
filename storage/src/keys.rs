//! Key layout
//!
//! Everything lives in the default sled tree under a type prefix, so one
//! transaction can span members, entries, indexes, logs and pools.

use chrono::{DateTime, Utc};
use upline_core::MemberId;

pub const MEMBER_PREFIX: &str = "member:";
pub const ENTRY_PREFIX: &str = "entry:";
pub const HELD_PREFIX: &str = "held:";
pub const WINDOW_PREFIX: &str = "window:";
pub const DISTRIBUTION_PREFIX: &str = "dist:";
pub const POOL_DISTRIBUTION_PREFIX: &str = "pooldist:";
pub const JOB_PREFIX: &str = "job:";

pub fn member(id: &MemberId) -> String {
    format!("{}{}", MEMBER_PREFIX, id)
}

pub fn entry(id: &str) -> String {
    format!("{}{}", ENTRY_PREFIX, id)
}

pub fn held(id: &str) -> String {
    format!("{}{}", HELD_PREFIX, id)
}

/// UTC day window, e.g. `2026-10-16`
pub fn day_window(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

/// UTC month window, e.g. `2026-10`
pub fn month_window(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

pub fn window(member: &MemberId, period: &str) -> String {
    format!("{}{}|{}", WINDOW_PREFIX, member, period)
}

pub fn distribution(reference: &str) -> String {
    format!("{}{}", DISTRIBUTION_PREFIX, reference)
}

/// Time-ordered so a prefix scan returns history oldest first
pub fn pool_distribution(at: DateTime<Utc>, id: &str) -> String {
    format!(
        "{}{:020}:{}",
        POOL_DISTRIBUTION_PREFIX,
        at.timestamp_millis().max(0),
        id
    )
}

pub fn job(marker: &str) -> String {
    format!("{}{}", JOB_PREFIX, marker)
}
