//! Reset and release jobs
//!
//! Daily reset zeroes the rolling daily counter. Monthly reset zeroes the
//! rolling monthly counter and then releases every HELD entry; released
//! amounts count in the new month's windows. Release is
//! atomic per entry and never aborts the whole run: a failed entry is
//! recorded in the report and the loop moves on. Re-running is safe because
//! already-PAID entries are skipped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use upline_core::{Amount, HeldFilter, Result};
use upline_storage::{RollingCounter, Store};

use crate::limits::{day_window, month_window};

pub const MONTHLY_RELEASE_NOTE: &str = "Released by monthly reset";
pub const MANUAL_RELEASE_NOTE: &str = "Released manually";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseFailure {
    pub entry_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseReport {
    pub released: usize,
    pub released_amount: Amount,
    /// Entries that were already PAID
    pub skipped: usize,
    pub failures: Vec<ReleaseFailure>,
}

impl ReleaseReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyResetReport {
    pub window: String,
    pub counters_reset: usize,
    pub release: ReleaseReport,
}

pub fn daily_marker(at: DateTime<Utc>) -> String {
    format!("daily:{}", day_window(at))
}

pub fn monthly_marker(at: DateTime<Utc>) -> String {
    format!("monthly:{}", month_window(at))
}

/// Set once the month's counters are zeroed, so a retried release does not
/// zero them again
fn monthly_counters_marker(at: DateTime<Utc>) -> String {
    format!("monthly-counters:{}", month_window(at))
}

/// Release the given entries, one transaction each
pub fn release_entries(store: &Store, ids: &[String], note: &str, at: DateTime<Utc>) -> ReleaseReport {
    let mut report = ReleaseReport::default();
    for id in ids {
        match store.transaction(|txn| txn.release_entry(id, note, at)) {
            Ok(Some(entry)) => {
                report.released += 1;
                report.released_amount += entry.amount;
            }
            Ok(None) => report.skipped += 1,
            Err(e) => {
                warn!("[RELEASE] Failed to release entry {}: {}", id, e);
                report.failures.push(ReleaseFailure {
                    entry_id: id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    report
}

/// Release every HELD entry in the ledger
pub fn release_all_held(store: &Store, note: &str, at: DateTime<Utc>) -> Result<ReleaseReport> {
    let ids: Vec<String> = store
        .held_entries(&HeldFilter::default())?
        .into_iter()
        .map(|e| e.id)
        .collect();
    Ok(release_entries(store, &ids, note, at))
}

pub fn run_daily_reset(store: &Store, at: DateTime<Utc>) -> Result<usize> {
    let reset = store.reset_rolling(RollingCounter::Daily)?;
    info!("[SCHEDULER] Daily reset for {}: {} counters zeroed", day_window(at), reset);
    Ok(reset)
}

/// Run the daily reset unless it already ran for this UTC day
pub fn run_daily_reset_if_due(store: &Store, at: DateTime<Utc>) -> Result<bool> {
    let marker = daily_marker(at);
    if store.job_marker(&marker)?.is_some() {
        return Ok(false);
    }
    run_daily_reset(store, at)?;
    store.transaction(|txn| txn.mark_job(&marker, at))?;
    Ok(true)
}

pub fn run_monthly_reset(store: &Store, at: DateTime<Utc>) -> Result<MonthlyResetReport> {
    let counters_reset = store.reset_rolling(RollingCounter::Monthly)?;
    let release = release_all_held(store, MONTHLY_RELEASE_NOTE, at)?;
    Ok(monthly_report(at, counters_reset, release))
}

fn monthly_report(
    at: DateTime<Utc>,
    counters_reset: usize,
    release: ReleaseReport,
) -> MonthlyResetReport {
    if release.is_complete() {
        info!(
            "[SCHEDULER] Monthly reset for {}: {} counters zeroed, released {} entries ({})",
            month_window(at),
            counters_reset,
            release.released,
            release.released_amount
        );
    } else {
        warn!(
            "[SCHEDULER] Monthly reset for {}: released {} entries, {} failed",
            month_window(at),
            release.released,
            release.failures.len()
        );
    }

    MonthlyResetReport {
        window: month_window(at),
        counters_reset,
        release,
    }
}

/// Run the monthly reset unless it already completed for this UTC month.
/// Safe to call on every tick: the first call in a month does the work, and
/// a run with release failures is not marked, so the next call retries the
/// failed entries without zeroing the counters again.
pub fn run_monthly_reset_if_due(store: &Store, at: DateTime<Utc>) -> Result<Option<MonthlyResetReport>> {
    let marker = monthly_marker(at);
    if store.job_marker(&marker)?.is_some() {
        return Ok(None);
    }

    let counters_marker = monthly_counters_marker(at);
    let counters_reset = if store.job_marker(&counters_marker)?.is_none() {
        let reset = store.reset_rolling(RollingCounter::Monthly)?;
        store.transaction(|txn| txn.mark_job(&counters_marker, at))?;
        reset
    } else {
        0
    };

    let release = release_all_held(store, MONTHLY_RELEASE_NOTE, at)?;
    let report = monthly_report(at, counters_reset, release);
    if report.release.is_complete() {
        store.transaction(|txn| txn.mark_job(&marker, at))?;
    }
    Ok(Some(report))
}
