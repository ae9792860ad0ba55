/// All errors that can be returned by a ContentStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No entry with the given id exists in the environment.
    #[error("entry not found: {id}")]
    NotFound { id: String },

    /// An entry with this id already exists (create with explicit id).
    #[error("entry already exists: {id}")]
    AlreadyExists { id: String },

    /// The entry was modified since it was read. `expected` is the version
    /// the caller sent.
    #[error("version mismatch on entry {id}: sent version {expected}")]
    VersionMismatch { id: String, expected: i64 },

    /// The store refused the request because of its rate limit.
    #[error("rate limited by the content store")]
    RateLimited,

    /// Credentials were rejected or lack the required permission.
    #[error("access denied: {0}")]
    Unauthorized(String),

    /// The store rejected the payload (unknown field, bad filter, etc.).
    #[error("rejected by the content store: {0}")]
    Validation(String),

    /// A backend-specific error (transport, serialization, etc.).
    #[error("content store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// `true` for the expected "absent" branch of an existence check.
    ///
    /// Every other variant is an unexpected failure and must not be
    /// treated as "does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_not_found_is_not_found() {
        assert!(StoreError::NotFound { id: "x".into() }.is_not_found());
        assert!(!StoreError::Backend("boom".into()).is_not_found());
        assert!(!StoreError::RateLimited.is_not_found());
        assert!(!StoreError::Unauthorized("token".into()).is_not_found());
    }

    #[test]
    fn display_carries_id() {
        let err = StoreError::VersionMismatch {
            id: "abc".into(),
            expected: 3,
        };
        assert_eq!(
            err.to_string(),
            "version mismatch on entry abc: sent version 3"
        );
    }
}
