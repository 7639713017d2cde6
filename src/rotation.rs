//! Monthly chore rotation.
//!
//! Pure arithmetic over the roster and catalog: no clock, no storage.
//! `seed = year * 12 + month`; the task at catalog index `i` goes to
//! `roster[(seed + i) mod |roster|]`.

use crate::error::{Result, RotaError};
use crate::models::Period;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub task_name: String,
    pub assignee: String,
}

/// A validated roster + catalog pair.
#[derive(Debug, Clone)]
pub struct Rotation {
    roster: Vec<String>,
    catalog: Vec<String>,
}

impl Rotation {
    pub fn new(roster: Vec<String>, catalog: Vec<String>) -> Result<Self> {
        check_names("roster", &roster)?;
        check_names("catalog", &catalog)?;
        Ok(Rotation { roster, catalog })
    }

    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    pub fn catalog(&self) -> &[String] {
        &self.catalog
    }

    /// Assignments for a period, in catalog order.
    pub fn assignments(&self, period: Period) -> Vec<Assignment> {
        compute_assignments(period, &self.roster, &self.catalog)
    }

    pub fn assignee_for(&self, period: Period, task_name: &str) -> Option<String> {
        self.assignments(period)
            .into_iter()
            .find(|a| a.task_name == task_name)
            .map(|a| a.assignee)
    }

    pub fn catalog_position(&self, task_name: &str) -> Option<usize> {
        self.catalog.iter().position(|name| name == task_name)
    }
}

/// Map every catalog entry to a roster member for the given period.
/// An empty roster yields no assignments.
pub fn compute_assignments(period: Period, roster: &[String], catalog: &[String]) -> Vec<Assignment> {
    if roster.is_empty() {
        return Vec::new();
    }
    let seed = period.seed();
    let len = roster.len() as i64;

    catalog
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let idx = (seed + i as i64).rem_euclid(len) as usize;
            Assignment {
                task_name: name.clone(),
                assignee: roster[idx].clone(),
            }
        })
        .collect()
}

fn check_names(what: &str, names: &[String]) -> Result<()> {
    if names.is_empty() {
        return Err(RotaError::Validation(format!("{what} must not be empty")));
    }
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(RotaError::Validation(format!("{what} contains a blank name")));
        }
        if !seen.insert(name.as_str()) {
            return Err(RotaError::Validation(format!("{what} lists {name} twice")));
        }
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn house() -> Rotation {
        Rotation::new(
            names(&["deepanshu", "sonu", "sachin", "sintu"]),
            names(&["Kitchen", "Bathroom", "Hall", "Trash"]),
        )
        .unwrap()
    }

    fn pairs(assignments: &[Assignment]) -> Vec<(&str, &str)> {
        assignments
            .iter()
            .map(|a| (a.task_name.as_str(), a.assignee.as_str()))
            .collect()
    }

    #[test]
    fn january_2026_rotation() {
        let jan = Period::new(1, 2026).unwrap();
        assert_eq!(
            pairs(&house().assignments(jan)),
            vec![
                ("Kitchen", "sonu"),
                ("Bathroom", "sachin"),
                ("Hall", "sintu"),
                ("Trash", "deepanshu"),
            ]
        );
    }

    #[test]
    fn february_shifts_everyone_by_one() {
        let feb = Period::new(2, 2026).unwrap();
        assert_eq!(
            pairs(&house().assignments(feb)),
            vec![
                ("Kitchen", "sachin"),
                ("Bathroom", "sintu"),
                ("Hall", "deepanshu"),
                ("Trash", "sonu"),
            ]
        );
    }

    #[test]
    fn assignments_are_deterministic() {
        let rotation = house();
        for year in [1999, 2025, 2026, 2100] {
            for month in 1..=12 {
                let p = Period::new(month, year).unwrap();
                assert_eq!(rotation.assignments(p), rotation.assignments(p));
            }
        }
    }

    #[test]
    fn each_task_visits_every_roommate_over_a_cycle() {
        let rotation = house();
        let mut kitchen: Vec<String> = (1..=4)
            .map(|m| rotation.assignee_for(Period::new(m, 2026).unwrap(), "Kitchen").unwrap())
            .collect();
        kitchen.sort();
        assert_eq!(kitchen, names(&["deepanshu", "sachin", "sintu", "sonu"]));
    }

    #[test]
    fn catalog_longer_than_roster_wraps() {
        let r = Rotation::new(names(&["a", "b"]), names(&["t0", "t1", "t2"])).unwrap();
        // seed for 1/2026 is odd
        let got = r.assignments(Period::new(1, 2026).unwrap());
        assert_eq!(pairs(&got), vec![("t0", "b"), ("t1", "a"), ("t2", "b")]);
    }

    #[test]
    fn empty_roster_yields_nothing() {
        let p = Period::new(5, 2026).unwrap();
        assert!(compute_assignments(p, &[], &names(&["Kitchen"])).is_empty());
    }

    #[test]
    fn rejects_bad_rosters_and_catalogs() {
        assert!(Rotation::new(vec![], names(&["Kitchen"])).is_err());
        assert!(Rotation::new(names(&["a"]), vec![]).is_err());
        assert!(Rotation::new(names(&["a", " "]), names(&["Kitchen"])).is_err());
        assert!(Rotation::new(names(&["a", "a"]), names(&["Kitchen"])).is_err());
    }

    #[test]
    fn catalog_position_lookup() {
        let r = house();
        assert_eq!(r.catalog_position("Hall"), Some(2));
        assert_eq!(r.catalog_position("Garage"), None);
    }
}
