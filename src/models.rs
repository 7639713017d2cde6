use crate::error::{Result, RotaError};
use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ── Period ─────────────────────────────────────────────────────

/// One rotation cycle: a calendar month of a given year.
///
/// Field order matters: the derived `Ord` compares year first, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(month: u32, year: i32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(RotaError::Validation(format!(
                "month must be 1-12, got {month}"
            )));
        }
        Ok(Period { year, month })
    }

    /// The period a timestamp falls in.
    pub fn containing<Tz: TimeZone>(at: &DateTime<Tz>) -> Self {
        Period {
            year: at.year(),
            month: at.month(),
        }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Rotation seed: `year * 12 + month`.
    pub fn seed(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month)
    }

    pub fn next(&self) -> Period {
        if self.month == 12 {
            Period { year: self.year + 1, month: 1 }
        } else {
            Period { year: self.year, month: self.month + 1 }
        }
    }

    pub fn previous(&self) -> Period {
        if self.month == 1 {
            Period { year: self.year - 1, month: 12 }
        } else {
            Period { year: self.year, month: self.month - 1 }
        }
    }

    /// Day-of-month of the last day in this period.
    pub fn last_day(&self) -> u32 {
        self.first_day()
            .and_then(|first| first.checked_add_months(Months::new(1)))
            .and_then(|next| next.pred_opt())
            .map(|last| last.day())
            .unwrap_or(31)
    }

    /// First calendar day of the period. `None` only outside chrono's year range.
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

// ── Entities ───────────────────────────────────────────────────

/// A roommate. Username is the identity key; mobile is an optional,
/// unique profile attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub mobile: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Build a user from an already-hashed credential.
    /// See `auth::new_user` for the plaintext path.
    pub fn new(
        username: &str,
        mobile: Option<String>,
        password_hash: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            mobile,
            password_hash,
            created_at,
        }
    }
}

/// One chore for one month. (name, month, year) is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub assigned_to: String,
    pub month: u32,
    pub year: i32,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn pending(name: &str, assigned_to: &str, period: Period, created_at: DateTime<Utc>) -> Self {
        Task {
            id: Uuid::new_v4(),
            name: name.to_string(),
            assigned_to: assigned_to.to_string(),
            month: period.month,
            year: period.year,
            completed: false,
            completed_at: None,
            created_at,
        }
    }

    pub fn period(&self) -> Period {
        Period { year: self.year, month: self.month }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryAction {
    Completed,
}

/// Append-only record of who did what to which task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHistoryEntry {
    pub seq: u64,
    pub task_id: Uuid,
    pub task_name: String,
    pub username: String,
    pub action: HistoryAction,
    pub at: DateTime<Utc>,
}

/// The slice of a task shown in status views and report snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub name: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        TaskSummary {
            name: task.name.clone(),
            completed: task.completed,
            completed_at: task.completed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatus {
    pub username: String,
    pub tasks: Vec<TaskSummary>,
}

/// Per-user monthly snapshot. Unique on (user_id, month, year); a cache that
/// can always be rebuilt from the task rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub user_id: Uuid,
    pub username: String,
    pub month: u32,
    pub year: i32,
    pub tasks_assigned: u32,
    pub tasks_completed: u32,
    pub completion_percentage: u8,
    /// JSON array of `TaskSummary`, in catalog order.
    pub task_snapshot: String,
    pub generated_at: DateTime<Utc>,
}

impl MonthlyReport {
    pub fn period(&self) -> Period {
        Period { year: self.year, month: self.month }
    }

    pub fn snapshot(&self) -> Result<Vec<TaskSummary>> {
        serde_json::from_str(&self.task_snapshot)
            .map_err(|e| RotaError::StoreUnavailable(format!("report snapshot: {e}")))
    }
}

// ── Tests ──────────────────────────────────────────────────────
