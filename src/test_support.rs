//! Shared fixtures for the unit tests.

use crate::clock::FixedClock;
use crate::models::{Period, User};
use crate::rotation::Rotation;
use crate::store::TaskStore;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;

pub const HOUSE: [&str; 4] = ["deepanshu", "sonu", "sachin", "sintu"];
pub const CHORES: [&str; 4] = ["Kitchen", "Bathroom", "Hall", "Trash"];

pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

pub fn jan_2026() -> Period {
    Period::new(1, 2026).unwrap()
}

pub fn house_rotation() -> Rotation {
    Rotation::new(
        HOUSE.iter().map(|s| s.to_string()).collect(),
        CHORES.iter().map(|s| s.to_string()).collect(),
    )
    .unwrap()
}

/// Fresh store in a scratch directory. Keep the TempDir alive for the test.
pub fn temp_store(now: DateTime<Utc>) -> (TaskStore, TempDir) {
    let (store, _clock, dir) = temp_store_with_clock(now);
    (store, dir)
}

pub fn temp_store_with_clock(now: DateTime<Utc>) -> (TaskStore, Arc<FixedClock>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(FixedClock::new(now));
    let store = TaskStore::open(dir.path().join("rota.redb"), house_rotation(), clock.clone()).unwrap();
    (store, clock, dir)
}

/// Insert the four roommates with placeholder hashes (no argon2 cost).
pub fn seed_house(store: &TaskStore) -> Vec<User> {
    HOUSE
        .iter()
        .map(|name| {
            let user = User::new(name, None, "x".into(), store.now());
            store.create_user(&user).unwrap();
            user
        })
        .collect()
}
