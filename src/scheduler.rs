//! Month-boundary hooks.
//!
//! Two triggers, both safe to fire more than once:
//! - start of month: materialise the month's tasks, and take the previous
//!   month's snapshot if its end-of-month window was missed,
//! - end of month: snapshot everyone's report before the rollover.
//!
//! Whether a trigger already ran is read back from the stored rows; the
//! scheduler keeps no state of its own.

use crate::clock::Clock;
use crate::error::{Result, RotaError};
use crate::models::{MonthlyReport, Period};
use crate::report::ReportAggregator;
use crate::store::TaskStore;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between ticks.
    pub tick_interval_secs: u64,
    /// The start-of-month trigger fires on days 1..=start_window_days.
    pub start_window_days: u32,
    /// The end-of-month trigger fires on the last day from this hour (UTC).
    pub end_of_month_hour: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            tick_interval_secs: 300,
            start_window_days: 1,
            end_of_month_hour: 20,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_secs == 0 {
            return Err(RotaError::Validation("tick_interval_secs must be positive".into()));
        }
        if !(1..=28).contains(&self.start_window_days) {
            return Err(RotaError::Validation("start_window_days must be 1-28".into()));
        }
        if self.end_of_month_hour > 23 {
            return Err(RotaError::Validation("end_of_month_hour must be 0-23".into()));
        }
        Ok(())
    }
}

/// What a tick did. `None` means the trigger was outside its window or
/// already satisfied.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub tasks_created: Option<usize>,
    pub reports_generated: Option<usize>,
    /// Late snapshot of the previous month, taken at the start of this one.
    pub previous_reports_generated: Option<usize>,
}

pub struct Scheduler {
    store: TaskStore,
    reports: ReportAggregator,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        store: TaskStore,
        reports: ReportAggregator,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Scheduler { store, reports, clock, config }
    }

    fn current_period(&self) -> Period {
        Period::containing(&self.clock.now())
    }

    /// Start-of-month trigger. Also the boot-time and admin entry point.
    pub fn start_of_month(&self) -> Result<usize> {
        self.store.ensure_monthly_tasks(self.current_period())
    }

    /// End-of-month trigger. Regenerates unconditionally when called directly.
    pub fn end_of_month(&self) -> Result<Vec<MonthlyReport>> {
        self.reports.generate_all_reports(self.current_period())
    }

    /// Evaluate both triggers against the clock once. Failures are logged.
    pub fn tick(&self) -> TickOutcome {
        let now = self.clock.now();
        let period = Period::containing(&now);
        let mut outcome = TickOutcome::default();

        if now.day() <= self.config.start_window_days {
            match self.store.ensure_monthly_tasks(period) {
                Ok(created) => outcome.tasks_created = Some(created),
                Err(e) => error!(%period, error = %e, "start-of-month trigger failed"),
            }
            outcome.previous_reports_generated = self.catch_up(period.previous());
        }

        if let Some(window_start) = self.end_of_month_window(&now) {
            match self.reports_pending(period, window_start) {
                Ok(true) => match self.reports.generate_all_reports(period) {
                    Ok(reports) => outcome.reports_generated = Some(reports.len()),
                    Err(e) => error!(%period, error = %e, "end-of-month trigger failed"),
                },
                Ok(false) => debug!(%period, "reports already taken this window"),
                Err(e) => error!(%period, error = %e, "cannot read existing reports"),
            }
        }

        outcome
    }

    /// Snapshot a finished month whose end-of-month window passed without
    /// one, e.g. because the process was down. Months without tasks are left
    /// alone.
    fn catch_up(&self, previous: Period) -> Option<usize> {
        let window_start = self.window_start(previous)?;
        let pending = self.store.tasks_for_period(previous).and_then(|tasks| {
            if tasks.is_empty() {
                Ok(false)
            } else {
                self.reports_pending(previous, window_start)
            }
        });
        match pending {
            Ok(true) => match self.reports.generate_all_reports(previous) {
                Ok(reports) => {
                    info!(period = %previous, generated = reports.len(), "missed end-of-month snapshot taken");
                    Some(reports.len())
                }
                Err(e) => {
                    error!(period = %previous, error = %e, "catch-up snapshot failed");
                    None
                }
            },
            Ok(false) => None,
            Err(e) => {
                error!(period = %previous, error = %e, "cannot check the previous month");
                None
            }
        }
    }

    /// Start of the end-of-month window, if `now` is inside it.
    fn end_of_month_window(&self, now: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        let period = Period::containing(now);
        if now.day() != period.last_day() {
            return None;
        }
        let start = self.window_start(period)?;
        (*now >= start).then_some(start)
    }

    /// `end_of_month_hour` on the period's last day.
    fn window_start(&self, period: Period) -> Option<DateTime<Utc>> {
        let last = period.first_day()?.with_day(period.last_day())?;
        let naive = last.and_hms_opt(self.config.end_of_month_hour, 0, 0)?;
        Some(Utc.from_utc_datetime(&naive))
    }

    fn reports_pending(&self, period: Period, window_start: DateTime<Utc>) -> Result<bool> {
        let existing = self.reports.get_all_reports_for_period(period)?;
        Ok(!existing.iter().any(|r| r.generated_at >= window_start))
    }

    /// Tick every `tick_interval_secs` until `shutdown` flips or its sender
    /// goes away. The first tick runs immediately.
    pub fn run(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.config.tick_interval_secs,
                "scheduler started"
            );
            let mut interval =
                tokio::time::interval(Duration::from_secs(self.config.tick_interval_secs.max(1)));

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let outcome = self.tick();
                        if outcome != TickOutcome::default() {
                            debug!(?outcome, "scheduler tick");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("scheduler stopped");
        })
    }
}

/// Signal the loop started by [`Scheduler::run`] to stop and wait for it.
/// Returns `false`, after logging, if the task panicked or was cancelled.
pub async fn stop(shutdown: watch::Sender<bool>, handle: JoinHandle<()>) -> bool {
    let _ = shutdown.send(true);
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "scheduler task ended abnormally");
            false
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────
