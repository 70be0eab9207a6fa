//! Vote repository.

use std::sync::Arc;

use crate::{
    entities::{Vote, user, vote},
    error::StorageViolation,
};
use chrono::Utc;
use pollbox_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    FromQueryResult, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Set,
};
use serde::Serialize;

/// Unique index enforcing one vote per `(user_id, poll_id)`.
pub const IDX_VOTE_USER_POLL: &str = "idx_vote_user_poll";
/// Foreign key from `vote.user_id` to `user.id`.
pub const FK_VOTE_USER: &str = "fk_vote_user";
/// Foreign key from `vote.poll_id` to `poll.id`.
pub const FK_VOTE_POLL: &str = "fk_vote_poll";
/// Foreign key from `vote.option_id` to `poll_option.id`.
pub const FK_VOTE_OPTION: &str = "fk_vote_option";

/// A user who voted for an option.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize)]
pub struct Voter {
    /// User ID.
    pub user_id: i32,
    /// Username.
    pub username: String,
}

/// Vote repository for database operations.
#[derive(Clone)]
pub struct VoteRepository {
    db: Arc<DatabaseConnection>,
}

impl VoteRepository {
    /// Create a new vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the vote a user cast on a poll, if any.
    pub async fn find_by_user_and_poll_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: i32,
        poll_id: i32,
    ) -> AppResult<Option<vote::Model>> {
        Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .filter(vote::Column::PollId.eq(poll_id))
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a vote.
    ///
    /// The storage constraints are the authority here: a unique violation
    /// on `(user_id, poll_id)` is a duplicate vote even if every pre-check
    /// passed, and foreign key violations name the missing reference.
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: i32,
        poll_id: i32,
        option_id: i32,
    ) -> AppResult<vote::Model> {
        let model = vote::ActiveModel {
            user_id: Set(user_id),
            poll_id: Set(poll_id),
            option_id: Set(option_id),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        model
            .insert(conn)
            .await
            .map_err(|e| map_insert_error(&e, user_id, poll_id, option_id))
    }

    /// Delete every vote on a poll.
    pub async fn delete_by_poll<C: ConnectionTrait>(
        &self,
        conn: &C,
        poll_id: i32,
    ) -> AppResult<u64> {
        let result = Vote::delete_many()
            .filter(vote::Column::PollId.eq(poll_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Count votes on a poll.
    pub async fn count_by_poll(&self, poll_id: i32) -> AppResult<u64> {
        Vote::find()
            .filter(vote::Column::PollId.eq(poll_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Users who voted for an option, in voting order.
    pub async fn voters_by_option(&self, option_id: i32) -> AppResult<Vec<Voter>> {
        Vote::find()
            .select_only()
            .column_as(user::Column::Id, "user_id")
            .column(user::Column::Username)
            .join(JoinType::InnerJoin, vote::Relation::User.def())
            .filter(vote::Column::OptionId.eq(option_id))
            .order_by_asc(vote::Column::Id)
            .into_model::<Voter>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

fn map_insert_error(err: &DbErr, user_id: i32, poll_id: i32, option_id: i32) -> AppError {
    let violation = StorageViolation::classify(err);
    match violation {
        StorageViolation::Unique { .. } => {
            tracing::warn!(
                user_id,
                poll_id,
                "Duplicate vote rejected by {IDX_VOTE_USER_POLL}"
            );
            AppError::Conflict("User has already voted on this poll".to_string())
        }
        StorageViolation::ForeignKey { .. } if violation.is_constraint(FK_VOTE_USER) => {
            AppError::Unauthorized
        }
        StorageViolation::ForeignKey { .. } if violation.is_constraint(FK_VOTE_POLL) => {
            AppError::PollNotFound(poll_id)
        }
        StorageViolation::ForeignKey { .. } if violation.is_constraint(FK_VOTE_OPTION) => {
            AppError::OptionNotFound(option_id)
        }
        StorageViolation::ForeignKey { .. } => {
            AppError::BadRequest("Invalid vote parameters".to_string())
        }
        StorageViolation::Other => AppError::Database(err.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};

    fn create_test_vote(id: i32, user_id: i32, poll_id: i32, option_id: i32) -> vote::Model {
        vote::Model {
            id,
            user_id,
            poll_id,
            option_id,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_user_and_poll_none() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<vote::Model>::new()])
                .into_connection(),
        );

        let repo = VoteRepository::new(Arc::clone(&db));
        let found = repo
            .find_by_user_and_poll_on(db.as_ref(), 2, 1)
            .await
            .unwrap();

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_create_returns_vote() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_vote(5, 2, 1, 10)]])
                .into_connection(),
        );

        let repo = VoteRepository::new(Arc::clone(&db));
        let vote = repo.create(db.as_ref(), 2, 1, 10).await.unwrap();

        assert_eq!(vote.id, 5);
        assert_eq!(vote.option_id, 10);
    }

    #[tokio::test]
    async fn test_create_opaque_failure_is_database_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_errors([DbErr::Custom("connection lost".to_string())])
                .into_connection(),
        );

        let repo = VoteRepository::new(Arc::clone(&db));
        let result = repo.create(db.as_ref(), 2, 1, 10).await;

        assert!(matches!(result, Err(AppError::Database(_))));
    }

    #[test]
    fn test_map_insert_error_other() {
        let err = DbErr::Custom("boom".to_string());
        assert!(matches!(
            map_insert_error(&err, 1, 2, 3),
            AppError::Database(_)
        ));
    }

    #[tokio::test]
    async fn test_delete_by_poll() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 4,
                }])
                .into_connection(),
        );

        let repo = VoteRepository::new(Arc::clone(&db));
        assert_eq!(repo.delete_by_poll(db.as_ref(), 1).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_voters_by_option() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![
                    btreemap! {
                        "user_id" => Into::<Value>::into(2),
                        "username" => Into::<Value>::into("bob"),
                    },
                    btreemap! {
                        "user_id" => Into::<Value>::into(3),
                        "username" => Into::<Value>::into("carol"),
                    },
                ]])
                .into_connection(),
        );

        let repo = VoteRepository::new(db);
        let voters = repo.voters_by_option(10).await.unwrap();

        assert_eq!(voters.len(), 2);
        assert_eq!(
            voters[0],
            Voter {
                user_id: 2,
                username: "bob".to_string(),
            }
        );
    }
}
