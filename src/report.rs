//! Monthly completion reports.
//!
//! A report is a cache over the task rows: regenerating one replaces the
//! stored row for (user, month, year) and yields the same numbers as long as
//! the tasks haven't changed.

use crate::error::{Result, RotaError};
use crate::models::{MonthlyReport, Period, Task, TaskSummary};
use crate::store::{decode, encode, TaskStore, MONTHLY_REPORTS};
use chrono::{DateTime, Utc};
use redb::ReadableTable;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Percentage reported for a user with nothing assigned.
pub const ZERO_ASSIGNED_PERCENTAGE: u8 = 0;

/// `round(100 * completed / assigned)`, halves rounding up.
pub fn completion_percentage(assigned: u32, completed: u32) -> u8 {
    if assigned == 0 {
        return ZERO_ASSIGNED_PERCENTAGE;
    }
    let assigned = u64::from(assigned);
    let completed = u64::from(completed).min(assigned);
    ((200 * completed + assigned) / (2 * assigned)) as u8
}

#[derive(Clone)]
pub struct ReportAggregator {
    store: TaskStore,
}

impl ReportAggregator {
    pub fn new(store: TaskStore) -> Self {
        ReportAggregator { store }
    }

    /// Build and upsert the report for one user.
    pub fn generate_report(&self, user_id: Uuid, username: &str, period: Period) -> Result<MonthlyReport> {
        let tasks = self.store.tasks_for_user(username, period)?;
        let report = build_report(user_id, username, period, &tasks, self.store.now())?;

        let key = report_key(user_id, period);
        self.store.write(|txn| {
            let mut reports = txn.open_table(MONTHLY_REPORTS)?;
            let bytes = encode(&report)?;
            reports.insert(key.as_str(), bytes.as_slice())?;
            Ok(())
        })?;

        debug!(
            username,
            %period,
            assigned = report.tasks_assigned,
            completed = report.tasks_completed,
            "report generated"
        );
        Ok(report)
    }

    /// Reports for every known user. A user whose report fails is logged and
    /// left out; the rest still go through.
    pub fn generate_all_reports(&self, period: Period) -> Result<Vec<MonthlyReport>> {
        let users = self.store.list_users()?;
        let mut reports = Vec::with_capacity(users.len());

        for user in users {
            match self.generate_report(user.id, &user.username, period) {
                Ok(report) => reports.push(report),
                Err(e) => warn!(username = %user.username, %period, error = %e, "skipping report"),
            }
        }

        info!(%period, generated = reports.len(), "monthly reports generated");
        Ok(reports)
    }

    /// Stored report, if any. Never generates.
    pub fn get_report(&self, user_id: Uuid, period: Period) -> Result<Option<MonthlyReport>> {
        let txn = self.store.db().begin_read()?;
        let reports = txn.open_table(MONTHLY_REPORTS)?;
        match reports.get(report_key(user_id, period).as_str())? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    /// A user's reports, newest period first.
    pub fn get_user_reports(&self, user_id: Uuid, limit: usize) -> Result<Vec<MonthlyReport>> {
        let prefix = format!("{user_id}/");
        let txn = self.store.db().begin_read()?;
        let reports = txn.open_table(MONTHLY_REPORTS)?;

        let mut out: Vec<MonthlyReport> = Vec::new();
        for entry in reports.range(prefix.as_str()..)? {
            let (key, value) = entry?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            out.push(decode(value.value())?);
        }
        out.sort_by(|a, b| b.period().cmp(&a.period()));
        out.truncate(limit);
        Ok(out)
    }

    /// Every stored report for a period, by username.
    pub fn get_all_reports_for_period(&self, period: Period) -> Result<Vec<MonthlyReport>> {
        let txn = self.store.db().begin_read()?;
        let reports = txn.open_table(MONTHLY_REPORTS)?;

        let mut out: Vec<MonthlyReport> = Vec::new();
        for entry in reports.iter()? {
            let (_, value) = entry?;
            let report: MonthlyReport = decode(value.value())?;
            if report.period() == period {
                out.push(report);
            }
        }
        out.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(out)
    }
}

fn report_key(user_id: Uuid, period: Period) -> String {
    format!("{user_id}/{period}")
}

fn build_report(
    user_id: Uuid,
    username: &str,
    period: Period,
    tasks: &[Task],
    generated_at: DateTime<Utc>,
) -> Result<MonthlyReport> {
    let assigned = tasks.len() as u32;
    let completed = tasks.iter().filter(|t| t.completed).count() as u32;
    let snapshot: Vec<TaskSummary> = tasks.iter().map(TaskSummary::from).collect();
    let task_snapshot = serde_json::to_string(&snapshot)
        .map_err(|e| RotaError::Internal(format!("report snapshot: {e}")))?;

    Ok(MonthlyReport {
        user_id,
        username: username.to_string(),
        month: period.month(),
        year: period.year(),
        tasks_assigned: assigned,
        tasks_completed: completed,
        completion_percentage: completion_percentage(assigned, completed),
        task_snapshot,
        generated_at,
    })
}

// ── Tests ──────────────────────────────────────────────────────
