use thiserror::Error;

/// Everything the core can fail with.
///
/// `Validation`, `NotFoundOrNotOwned`, `AlreadyCompleted` and
/// `InvalidCredentials` are user-facing and never retried. `Duplicate` is
/// swallowed by the idempotent seeding paths. `StoreUnavailable` covers the
/// backend itself and bubbles up to whoever called us. `Config` is a settings
/// file that can't be read or parsed; `Internal` is a failure of our own
/// machinery (hashing, serialising) unrelated to input or storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RotaError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("task not found or not assigned to caller")]
    NotFoundOrNotOwned,

    #[error("task already completed")]
    AlreadyCompleted,

    #[error("duplicate {0}")]
    Duplicate(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, RotaError>;

// redb 2.x has many error types. Blanket them all into StoreUnavailable.
macro_rules! from_redb {
    ($($t:ty),*) => {
        $(impl From<$t> for RotaError {
            fn from(e: $t) -> Self { RotaError::StoreUnavailable(format!("redb: {e}")) }
        })*
    };
}

from_redb!(
    redb::Error,
    redb::DatabaseError,
    redb::TableError,
    redb::TransactionError,
    redb::StorageError,
    redb::CommitError
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redb_errors_become_store_unavailable() {
        let err: RotaError = redb::StorageError::Corrupted("bad page".into()).into();
        match err {
            RotaError::StoreUnavailable(msg) => assert!(msg.starts_with("redb: ")),
            other => panic!("expected StoreUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn user_facing_messages() {
        assert_eq!(
            RotaError::NotFoundOrNotOwned.to_string(),
            "task not found or not assigned to caller"
        );
        assert_eq!(
            RotaError::Duplicate("username sonu".into()).to_string(),
            "duplicate username sonu"
        );
        assert_eq!(
            RotaError::Config("no settings.json".into()).to_string(),
            "configuration error: no settings.json"
        );
    }
}
