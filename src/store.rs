//! Task store: users, monthly tasks, completion history.
//!
//! One redb file is the source of truth. Every check-then-write runs inside a
//! single write transaction; redb admits one writer at a time, so two
//! completions of the same task cannot both succeed.

use crate::clock::Clock;
use crate::error::{Result, RotaError};
use crate::models::{
    HistoryAction, Period, Task, TaskHistoryEntry, TaskSummary, User, UserStatus,
};
use crate::rotation::Rotation;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, Table, TableDefinition, WriteTransaction};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub(crate) const USERS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("users");
pub(crate) const USERNAME_INDEX: TableDefinition<&str, &[u8]> = TableDefinition::new("username_index");
pub(crate) const MOBILE_INDEX: TableDefinition<&str, &[u8]> = TableDefinition::new("mobile_index");
pub(crate) const TASKS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("tasks");
/// "YYYY-MM/<name>" → task id. The uniqueness constraint on (name, month, year).
pub(crate) const TASK_SLOTS: TableDefinition<&str, &[u8]> = TableDefinition::new("task_slots");
/// "YYYY-MM/<assignee>/<name>" → task id. Lets a user's tasks be read
/// without touching anyone else's rows.
pub(crate) const ASSIGNEE_SLOTS: TableDefinition<&str, &[u8]> = TableDefinition::new("assignee_slots");
pub(crate) const TASK_HISTORY: TableDefinition<u64, &[u8]> = TableDefinition::new("task_history");
/// "<user id>/YYYY-MM" → report. The uniqueness constraint on (user, month, year).
pub(crate) const MONTHLY_REPORTS: TableDefinition<&str, &[u8]> = TableDefinition::new("monthly_reports");
pub(crate) const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const HISTORY_SEQ: &str = "history_seq";

type SlotTable<'txn> = Table<'txn, &'static str, &'static [u8]>;
type RowTable<'txn> = Table<'txn, &'static [u8], &'static [u8]>;

/// Handle to the store. Cloneable (Arc inside).
#[derive(Clone)]
pub struct TaskStore {
    db: Arc<Database>,
    rotation: Arc<Rotation>,
    clock: Arc<dyn Clock>,
}

impl TaskStore {
    /// Open (or create) the store at the given path.
    /// Creates tables if they don't exist.
    pub fn open(path: impl AsRef<Path>, rotation: Rotation, clock: Arc<dyn Clock>) -> Result<Self> {
        let db = Database::create(path.as_ref())?;

        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(USERS)?;
            let _ = txn.open_table(USERNAME_INDEX)?;
            let _ = txn.open_table(MOBILE_INDEX)?;
            let _ = txn.open_table(TASKS)?;
            let _ = txn.open_table(TASK_SLOTS)?;
            let _ = txn.open_table(ASSIGNEE_SLOTS)?;
            let _ = txn.open_table(TASK_HISTORY)?;
            let _ = txn.open_table(MONTHLY_REPORTS)?;
            let _ = txn.open_table(META)?;
        }
        txn.commit()?;

        debug!(path = %path.as_ref().display(), "store opened");
        Ok(TaskStore {
            db: Arc::new(db),
            rotation: Arc::new(rotation),
            clock,
        })
    }

    pub fn rotation(&self) -> &Rotation {
        &self.rotation
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn current_period(&self) -> Period {
        Period::containing(&self.clock.now())
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }

    /// Run `f` in a write transaction. Commits on Ok, aborts on Err.
    pub(crate) fn write<T>(&self, f: impl FnOnce(&WriteTransaction) -> Result<T>) -> Result<T> {
        let txn = self.db.begin_write()?;
        match f(&txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                txn.abort()?;
                Err(e)
            }
        }
    }

    // ── Users ──────────────────────────────────────────────────

    /// Insert a user. Fails with `Duplicate` if the username or mobile
    /// number is already taken.
    pub fn create_user(&self, user: &User) -> Result<()> {
        if user.username.trim().is_empty() {
            return Err(RotaError::Validation("username must not be empty".into()));
        }
        self.write(|txn| {
            let mut users = txn.open_table(USERS)?;
            let mut by_name = txn.open_table(USERNAME_INDEX)?;
            let mut by_mobile = txn.open_table(MOBILE_INDEX)?;

            if by_name.get(user.username.as_str())?.is_some() {
                return Err(RotaError::Duplicate(format!("username {}", user.username)));
            }
            if let Some(mobile) = &user.mobile {
                if by_mobile.get(mobile.as_str())?.is_some() {
                    return Err(RotaError::Duplicate(format!("mobile {mobile}")));
                }
                by_mobile.insert(mobile.as_str(), user.id.as_bytes().as_slice())?;
            }

            let bytes = encode(user)?;
            users.insert(user.id.as_bytes().as_slice(), bytes.as_slice())?;
            by_name.insert(user.username.as_str(), user.id.as_bytes().as_slice())?;
            Ok(())
        })?;
        debug!(username = %user.username, "user created");
        Ok(())
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let txn = self.db.begin_read()?;
        let users = txn.open_table(USERS)?;
        match users.get(id.as_bytes().as_slice())? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let txn = self.db.begin_read()?;
        let by_name = txn.open_table(USERNAME_INDEX)?;
        let Some(id) = by_name.get(username)? else {
            return Ok(None);
        };
        let users = txn.open_table(USERS)?;
        match users.get(id.value())? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    /// All users, sorted by username.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let txn = self.db.begin_read()?;
        let users = txn.open_table(USERS)?;

        let mut out = Vec::new();
        for entry in users.iter()? {
            let (_, value) = entry?;
            out.push(decode::<User>(value.value())?);
        }
        out.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(out)
    }

    // ── Tasks ──────────────────────────────────────────────────

    /// Materialise the period's tasks from the rotation if none exist yet.
    /// Returns how many were created; repeat calls return 0.
    pub fn ensure_monthly_tasks(&self, period: Period) -> Result<usize> {
        let now = self.clock.now();
        let created = self.write(|txn| {
            let mut slots = txn.open_table(TASK_SLOTS)?;
            let mut assignees = txn.open_table(ASSIGNEE_SLOTS)?;
            let mut tasks = txn.open_table(TASKS)?;

            if !ids_with_prefix(&slots, &format!("{period}/"))?.is_empty() {
                return Ok(0);
            }

            let mut created = 0;
            for a in self.rotation.assignments(period) {
                let task = Task::pending(&a.task_name, &a.assignee, period, now);
                match insert_task(&mut slots, &mut assignees, &mut tasks, &task) {
                    Ok(()) => created += 1,
                    Err(RotaError::Duplicate(what)) => debug!(%what, "slot already filled"),
                    Err(e) => return Err(e),
                }
            }
            Ok(created)
        })?;

        if created > 0 {
            info!(%period, created, "monthly tasks created");
        }
        Ok(created)
    }

    /// Insert a single pending task. `Duplicate` if (name, period) is taken.
    pub fn create_task(&self, name: &str, assignee: &str, period: Period) -> Result<Task> {
        if name.trim().is_empty() || assignee.trim().is_empty() {
            return Err(RotaError::Validation("task name and assignee are required".into()));
        }
        let task = Task::pending(name, assignee, period, self.clock.now());
        self.write(|txn| {
            let mut slots = txn.open_table(TASK_SLOTS)?;
            let mut assignees = txn.open_table(ASSIGNEE_SLOTS)?;
            let mut tasks = txn.open_table(TASKS)?;
            insert_task(&mut slots, &mut assignees, &mut tasks, &task)
        })?;
        Ok(task)
    }

    pub fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        let txn = self.db.begin_read()?;
        let tasks = txn.open_table(TASKS)?;
        match tasks.get(id.as_bytes().as_slice())? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    /// Tasks for a period, in catalog order.
    pub fn tasks_for_period(&self, period: Period) -> Result<Vec<Task>> {
        let txn = self.db.begin_read()?;
        let slots = txn.open_table(TASK_SLOTS)?;
        let tasks = txn.open_table(TASKS)?;

        let ids = ids_with_prefix(&slots, &format!("{period}/"))?;
        let mut out = load_tasks(&tasks, &ids)?;
        self.sort_by_catalog(&mut out);
        Ok(out)
    }

    /// One user's tasks for a period, in catalog order. Reads only that
    /// user's rows, so a damaged row elsewhere in the month doesn't fail it.
    pub fn tasks_for_user(&self, username: &str, period: Period) -> Result<Vec<Task>> {
        let txn = self.db.begin_read()?;
        let assignees = txn.open_table(ASSIGNEE_SLOTS)?;
        let tasks = txn.open_table(TASKS)?;

        let ids = ids_with_prefix(&assignees, &format!("{period}/{username}/"))?;
        let mut out = load_tasks(&tasks, &ids)?;
        out.retain(|t| t.assigned_to == username);
        self.sort_by_catalog(&mut out);
        Ok(out)
    }

    fn sort_by_catalog(&self, tasks: &mut [Task]) {
        tasks.sort_by_key(|t| {
            (
                self.rotation.catalog_position(&t.name).unwrap_or(usize::MAX),
                t.name.clone(),
            )
        });
    }

    /// Tasks for the month the clock is currently in.
    pub fn get_current_month_tasks(&self) -> Result<Vec<Task>> {
        self.tasks_for_period(self.current_period())
    }

    /// Mark a task done on behalf of `actor` and log it.
    ///
    /// Missing tasks and tasks owned by someone else are indistinguishable
    /// (`NotFoundOrNotOwned`). A completed task stays as it was.
    pub fn complete_task(&self, task_id: Uuid, actor: &str) -> Result<Task> {
        let now = self.clock.now();
        let result = self.write(|txn| {
            let mut tasks = txn.open_table(TASKS)?;
            let mut history = txn.open_table(TASK_HISTORY)?;
            let mut meta = txn.open_table(META)?;

            let mut task: Task = match tasks.get(task_id.as_bytes().as_slice())? {
                Some(data) => decode(data.value())?,
                None => return Err(RotaError::NotFoundOrNotOwned),
            };
            if task.assigned_to != actor {
                return Err(RotaError::NotFoundOrNotOwned);
            }
            if task.completed {
                return Err(RotaError::AlreadyCompleted);
            }

            task.completed = true;
            task.completed_at = Some(now);
            let bytes = encode(&task)?;
            tasks.insert(task_id.as_bytes().as_slice(), bytes.as_slice())?;

            let seq = meta.get(HISTORY_SEQ)?.map(|v| v.value()).unwrap_or(0) + 1;
            meta.insert(HISTORY_SEQ, seq)?;
            let entry = TaskHistoryEntry {
                seq,
                task_id,
                task_name: task.name.clone(),
                username: actor.to_string(),
                action: HistoryAction::Completed,
                at: now,
            };
            let bytes = encode(&entry)?;
            history.insert(seq, bytes.as_slice())?;

            Ok(task)
        });

        match &result {
            Ok(task) => info!(task = %task.name, period = %task.period(), actor, "task completed"),
            Err(e) => warn!(%task_id, actor, error = %e, "completion rejected"),
        }
        result
    }

    /// One entry per known user, each with the tasks assigned to them.
    pub fn get_all_users_status(&self, period: Period) -> Result<Vec<UserStatus>> {
        let users = self.list_users()?;
        let tasks = self.tasks_for_period(period)?;

        Ok(users
            .into_iter()
            .map(|user| UserStatus {
                tasks: tasks
                    .iter()
                    .filter(|t| t.assigned_to == user.username)
                    .map(TaskSummary::from)
                    .collect(),
                username: user.username,
            })
            .collect())
    }

    /// Most recent history entries first.
    pub fn get_history(&self, limit: usize) -> Result<Vec<TaskHistoryEntry>> {
        let txn = self.db.begin_read()?;
        let history = txn.open_table(TASK_HISTORY)?;

        let mut out = Vec::new();
        for entry in history.iter()?.rev().take(limit) {
            let (_, value) = entry?;
            out.push(decode(value.value())?);
        }
        Ok(out)
    }
}

// ── Helpers ────────────────────────────────────────────────────

fn slot_key(period: Period, name: &str) -> String {
    format!("{period}/{name}")
}

fn assignee_key(task: &Task) -> String {
    format!("{}/{}/{}", task.period(), task.assigned_to, task.name)
}

/// Task ids under every key starting with `prefix`.
fn ids_with_prefix<T>(index: &T, prefix: &str) -> Result<Vec<Vec<u8>>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let mut ids = Vec::new();
    for entry in index.range(prefix..)? {
        let (key, value) = entry?;
        if !key.value().starts_with(prefix) {
            break;
        }
        ids.push(value.value().to_vec());
    }
    Ok(ids)
}

fn load_tasks<T>(tasks: &T, ids: &[Vec<u8>]) -> Result<Vec<Task>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(data) = tasks.get(id.as_slice())? {
            out.push(decode::<Task>(data.value())?);
        }
    }
    Ok(out)
}

fn insert_task(
    slots: &mut SlotTable<'_>,
    assignees: &mut SlotTable<'_>,
    tasks: &mut RowTable<'_>,
    task: &Task,
) -> Result<()> {
    let key = slot_key(task.period(), &task.name);
    if slots.get(key.as_str())?.is_some() {
        return Err(RotaError::Duplicate(format!("task {key}")));
    }
    let bytes = encode(task)?;
    tasks.insert(task.id.as_bytes().as_slice(), bytes.as_slice())?;
    slots.insert(key.as_str(), task.id.as_bytes().as_slice())?;
    assignees.insert(assignee_key(task).as_str(), task.id.as_bytes().as_slice())?;
    Ok(())
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    postcard::to_allocvec(value).map_err(|e| RotaError::StoreUnavailable(format!("encode: {e}")))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    postcard::from_bytes(bytes).map_err(|e| RotaError::StoreUnavailable(format!("decode: {e}")))
}

// ── Tests ──────────────────────────────────────────────────────
