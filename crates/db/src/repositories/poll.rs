//! Poll repository.

use std::sync::Arc;

use crate::{
    entities::{Poll, poll},
    error::StorageViolation,
};
use pollbox_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryOrder, QuerySelect,
};

/// Name of the foreign key from `poll.creator_id` to `user.id`.
pub const FK_POLL_CREATOR: &str = "fk_poll_creator";

/// Poll repository for database operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a poll by ID.
    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a poll by ID, returning error if not found.
    pub async fn get_by_id(&self, id: i32) -> AppResult<poll::Model> {
        self.find_by_id(id)
            .await?
            .ok_or(AppError::PollNotFound(id))
    }

    /// Find a poll by ID on the given connection.
    pub async fn find_by_id_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: i32,
    ) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a poll by ID and lock its row until the surrounding
    /// transaction ends (`SELECT ... FOR UPDATE`).
    ///
    /// Serializes concurrent replace/delete operations on the same poll.
    pub async fn find_for_update<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: i32,
    ) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(id)
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List all polls ordered by ID.
    pub async fn find_all(&self) -> AppResult<Vec<poll::Model>> {
        Poll::find()
            .order_by_asc(poll::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new poll.
    ///
    /// A creator that does not reference an existing user surfaces as
    /// [`AppError::Unauthorized`]: the caller's identity is stale.
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: poll::ActiveModel,
    ) -> AppResult<poll::Model> {
        model.insert(conn).await.map_err(|e| {
            let violation = StorageViolation::classify(&e);
            if violation.is_constraint(FK_POLL_CREATOR) {
                AppError::Unauthorized
            } else {
                AppError::Database(e.to_string())
            }
        })
    }

    /// Delete a poll row. Options and votes must already be gone.
    pub async fn delete<C: ConnectionTrait>(&self, conn: &C, id: i32) -> AppResult<u64> {
        let result = Poll::delete_by_id(id)
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_poll(id: i32, creator_id: i32) -> poll::Model {
        poll::Model {
            id,
            title: format!("Poll {id}"),
            creator_id,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_get_by_id_found() {
        let poll = create_test_poll(3, 1);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[poll.clone()]])
                .into_connection(),
        );

        let repo = PollRepository::new(db);
        let result = repo.get_by_id(3).await.unwrap();

        assert_eq!(result.title, "Poll 3");
        assert_eq!(result.creator_id, 1);
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<poll::Model>::new()])
                .into_connection(),
        );

        let repo = PollRepository::new(db);
        let result = repo.get_by_id(3).await;

        assert!(matches!(result, Err(AppError::PollNotFound(3))));
    }

    #[tokio::test]
    async fn test_delete_reports_rows_affected() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = PollRepository::new(Arc::clone(&db));
        let deleted = repo.delete(db.as_ref(), 3).await.unwrap();

        assert_eq!(deleted, 1);
    }
}
