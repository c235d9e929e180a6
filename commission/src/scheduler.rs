//! Background job scheduler
//!
//! Checks the daily and monthly resets once at startup and then at every UTC
//! day boundary, and runs the passive pool distribution on a fixed interval.
//! Both resets are guarded by job markers, so a check that finds its window
//! already done is a no-op. Ledger work happens on the blocking
//! pool so sled transactions never stall the async runtime.

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration};
use tracing::{debug, error, info};
use upline_core::SchedulerConfig;

use crate::engine::CommissionEngine;
use crate::jobs::MonthlyResetReport;

/// Time left until the next UTC midnight
pub fn until_next_day(now: DateTime<Utc>) -> Duration {
    let tomorrow = now.date_naive() + ChronoDuration::days(1);
    let next = tomorrow.and_time(NaiveTime::MIN).and_utc();
    (next - now).to_std().unwrap_or(Duration::from_secs(1))
}

/// What one scheduler tick did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    pub daily_reset: bool,
    pub monthly_reset: Option<MonthlyResetReport>,
}

pub struct Scheduler {
    engine: Arc<CommissionEngine>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(engine: Arc<CommissionEngine>, config: SchedulerConfig) -> Self {
        Self { engine, config }
    }

    /// Run whatever reset is due at `now`. A month whose reset has not
    /// completed yet is picked up by the first tick in it, whatever the day.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickOutcome {
        let engine = self.engine.clone();
        let daily = self.config.daily_reset;
        let monthly = self.config.monthly_reset;

        let joined = tokio::task::spawn_blocking(move || {
            let mut outcome = TickOutcome::default();
            if daily {
                match engine.run_daily_reset_if_due(now) {
                    Ok(ran) => outcome.daily_reset = ran,
                    Err(e) => error!("[SCHEDULER] Daily reset failed: {}", e),
                }
            }
            if monthly {
                match engine.run_monthly_reset_if_due(now) {
                    Ok(report) => outcome.monthly_reset = report,
                    Err(e) => error!("[SCHEDULER] Monthly reset failed: {}", e),
                }
            }
            outcome
        })
        .await;

        match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("[SCHEDULER] Reset task panicked: {}", e);
                TickOutcome::default()
            }
        }
    }

    /// Spawn the background loops
    pub fn start(self) -> SchedulerHandle {
        let scheduler = Arc::new(self);
        let mut tasks = Vec::new();

        if scheduler.config.daily_reset || scheduler.config.monthly_reset {
            let s = scheduler.clone();
            tasks.push(tokio::spawn(async move {
                let outcome = s.tick(Utc::now()).await;
                debug!("[SCHEDULER] Startup tick: {:?}", outcome);
                loop {
                    let wait = until_next_day(Utc::now());
                    debug!("[SCHEDULER] Next reset check in {}s", wait.as_secs());
                    sleep(wait).await;
                    let outcome = s.tick(Utc::now()).await;
                    debug!("[SCHEDULER] Tick: {:?}", outcome);
                }
            }));
        }

        let hours = scheduler.config.passive_distribution_hours;
        if hours > 0 {
            let engine = scheduler.engine.clone();
            tasks.push(tokio::spawn(async move {
                let mut ticker = interval(Duration::from_secs(hours * 3600));
                ticker.tick().await; // first tick is immediate
                loop {
                    ticker.tick().await;
                    let engine = engine.clone();
                    let result =
                        tokio::task::spawn_blocking(move || engine.distribute_passive_pool(Utc::now()))
                            .await;
                    match result {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => error!("[SCHEDULER] Passive distribution failed: {}", e),
                        Err(e) => error!("[SCHEDULER] Passive distribution task panicked: {}", e),
                    }
                }
            }));
        }

        info!(
            "[SCHEDULER] Started (daily: {}, monthly: {}, passive every {}h)",
            scheduler.config.daily_reset, scheduler.config.monthly_reset, hours
        );
        SchedulerHandle { tasks }
    }
}

pub struct SchedulerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Stop every loop. A job already on the blocking pool runs to completion.
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        info!("[SCHEDULER] Stopped");
    }
}
