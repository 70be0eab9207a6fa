//! Classification of storage errors.
//!
//! Constraint violations carry meaning for the domain (a duplicate vote, a
//! vanished poll), so they are separated from opaque database failures
//! before being mapped onto [`AppError`](pollbox_common::AppError).

use sea_orm::{DbErr, SqlErr};

/// Kind of constraint a failed statement ran into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageViolation {
    /// A unique index rejected the row.
    Unique {
        /// Index or constraint name, when the driver reported one.
        constraint: Option<String>,
    },
    /// A foreign key rejected the row.
    ForeignKey {
        /// Constraint name, when the driver reported one.
        constraint: Option<String>,
    },
    /// Anything else.
    Other,
}

impl StorageViolation {
    /// Classify a database error.
    #[must_use]
    pub fn classify(err: &DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(message)) => Self::Unique {
                constraint: constraint_name(&message),
            },
            Some(SqlErr::ForeignKeyConstraintViolation(message)) => Self::ForeignKey {
                constraint: constraint_name(&message),
            },
            _ => Self::Other,
        }
    }

    /// Whether the violated constraint has the given name.
    #[must_use]
    pub fn is_constraint(&self, name: &str) -> bool {
        match self {
            Self::Unique { constraint } | Self::ForeignKey { constraint } => {
                constraint.as_deref() == Some(name)
            }
            Self::Other => false,
        }
    }
}

/// Extract the quoted constraint name from a driver message such as
/// `insert or update on table "vote" violates foreign key constraint "fk_vote_poll"`.
fn constraint_name(message: &str) -> Option<String> {
    let (_, rest) = message.rsplit_once("constraint \"")?;
    let (name, _) = rest.split_once('"')?;
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_name_from_postgres_fk_message() {
        let message = "insert or update on table \"vote\" violates foreign key constraint \"fk_vote_option\"";
        assert_eq!(constraint_name(message).as_deref(), Some("fk_vote_option"));
    }

    #[test]
    fn test_constraint_name_from_postgres_unique_message() {
        let message = "duplicate key value violates unique constraint \"idx_vote_user_poll\"";
        assert_eq!(
            constraint_name(message).as_deref(),
            Some("idx_vote_user_poll")
        );
    }

    #[test]
    fn test_constraint_name_missing() {
        assert_eq!(constraint_name("connection reset by peer"), None);
    }

    #[test]
    fn test_non_sql_errors_are_other() {
        let err = DbErr::Custom("boom".to_string());
        assert_eq!(StorageViolation::classify(&err), StorageViolation::Other);
        assert!(!StorageViolation::Other.is_constraint("fk_vote_poll"));
    }

    #[test]
    fn test_is_constraint() {
        let violation = StorageViolation::ForeignKey {
            constraint: Some("fk_vote_poll".to_string()),
        };
        assert!(violation.is_constraint("fk_vote_poll"));
        assert!(!violation.is_constraint("fk_vote_user"));
    }
}
