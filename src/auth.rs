use crate::error::{Result, RotaError};
use crate::models::User;
use crate::settings::RosterMember;
use crate::store::TaskStore;
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

// ── Hashing ────────────────────────────────────────────────────

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(hashing_failed)
}

fn hashing_failed(e: argon2::password_hash::Error) -> RotaError {
    RotaError::Internal(format!("cannot hash password: {e}"))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// A user with a freshly hashed password. Trims the password first.
pub fn new_user(
    username: &str,
    mobile: Option<String>,
    password: &str,
    created_at: DateTime<Utc>,
) -> Result<User> {
    if password.trim().is_empty() {
        return Err(RotaError::Validation("password must not be empty".into()));
    }
    let hash = hash_password(password.trim())?;
    Ok(User::new(username, mobile, hash, created_at))
}

// ── Login ──────────────────────────────────────────────────────

/// Check a username/password pair. Unknown users and wrong passwords are
/// the same failure.
pub fn login(store: &TaskStore, username: &str, password: &str) -> Result<User> {
    if username.trim().is_empty() || password.trim().is_empty() {
        return Err(RotaError::Validation("username and password are required".into()));
    }

    let user = store
        .get_user_by_username(username)?
        .ok_or(RotaError::InvalidCredentials)?;

    // stored hashes are of the trimmed password, see new_user
    if !verify_password(password.trim(), &user.password_hash) {
        return Err(RotaError::InvalidCredentials);
    }

    info!(username = %user.username, "logged in");
    Ok(user)
}

// ── Seeding ────────────────────────────────────────────────────

/// Create any roster member that doesn't exist yet, all with the same
/// starting password. Returns how many were created.
pub fn ensure_roster_users(
    store: &TaskStore,
    roster: &[RosterMember],
    default_password: &str,
) -> Result<usize> {
    let mut created = 0;
    for member in roster {
        if store.get_user_by_username(&member.username)?.is_some() {
            continue;
        }
        let user = new_user(&member.username, member.mobile.clone(), default_password, store.now())?;
        match store.create_user(&user) {
            Ok(()) => created += 1,
            Err(RotaError::Duplicate(what)) => debug!(%what, "roster user already present"),
            Err(e) => return Err(e),
        }
    }
    Ok(created)
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, temp_store};

    fn roster() -> Vec<RosterMember> {
        vec![
            RosterMember { username: "deepanshu".into(), mobile: Some("9000000001".into()) },
            RosterMember { username: "sonu".into(), mobile: None },
        ]
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("chores123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("chores123", &hash));
        assert!(!verify_password("chores124", &hash));
    }

    #[test]
    fn hashing_failure_is_internal() {
        assert!(matches!(
            hashing_failed(argon2::password_hash::Error::Algorithm),
            RotaError::Internal(_)
        ));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn seeding_is_idempotent() {
        let (store, _dir) = temp_store(at(2026, 1, 1, 0));
        assert_eq!(ensure_roster_users(&store, &roster(), "welcome").unwrap(), 2);
        assert_eq!(ensure_roster_users(&store, &roster(), "welcome").unwrap(), 0);

        let users = store.list_users().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].mobile.as_deref(), Some("9000000001"));
        assert!(users.iter().all(|u| u.password_hash != "welcome"));
    }

    #[test]
    fn login_checks_the_password() {
        let (store, _dir) = temp_store(at(2026, 1, 1, 0));
        ensure_roster_users(&store, &roster(), "welcome").unwrap();

        let user = login(&store, "sonu", "welcome").unwrap();
        assert_eq!(user.username, "sonu");

        assert_eq!(
            login(&store, "sonu", "wrong").unwrap_err(),
            RotaError::InvalidCredentials
        );
        assert_eq!(
            login(&store, "nobody", "welcome").unwrap_err(),
            RotaError::InvalidCredentials
        );
        assert!(matches!(
            login(&store, "", "welcome").unwrap_err(),
            RotaError::Validation(_)
        ));
    }

    #[test]
    fn blank_password_is_rejected() {
        assert!(matches!(
            new_user("sonu", None, "   ", at(2026, 1, 1, 0)).unwrap_err(),
            RotaError::Validation(_)
        ));
    }
}
