//! Poll option repository.

use std::sync::Arc;

use crate::{
    entities::{PollOption, Vote, poll_option, vote},
    error::StorageViolation,
};
use pollbox_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
    sea_query::Expr,
};
use serde::Serialize;

/// Name of the foreign key from `poll_option.poll_id` to `poll.id`.
pub const FK_POLL_OPTION_POLL: &str = "fk_poll_option_poll";

/// Live vote count for one option.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize)]
pub struct OptionTally {
    /// Option ID.
    pub option_id: i32,
    /// Option text.
    pub text: String,
    /// Number of votes referencing the option.
    pub votes: i64,
}

/// Poll option repository for database operations.
#[derive(Clone)]
pub struct PollOptionRepository {
    db: Arc<DatabaseConnection>,
}

impl PollOptionRepository {
    /// Create a new poll option repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an option by ID.
    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<poll_option::Model>> {
        self.find_by_id_on(self.db.as_ref(), id).await
    }

    /// Find an option by ID on the given connection.
    pub async fn find_by_id_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: i32,
    ) -> AppResult<Option<poll_option::Model>> {
        PollOption::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Options of a poll in creation order.
    pub async fn find_by_poll(&self, poll_id: i32) -> AppResult<Vec<poll_option::Model>> {
        PollOption::find()
            .filter(poll_option::Column::PollId.eq(poll_id))
            .order_by_asc(poll_option::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Options of several polls, ordered by poll then creation.
    pub async fn find_by_polls(&self, poll_ids: &[i32]) -> AppResult<Vec<poll_option::Model>> {
        if poll_ids.is_empty() {
            return Ok(vec![]);
        }

        PollOption::find()
            .filter(poll_option::Column::PollId.is_in(poll_ids.to_vec()))
            .order_by_asc(poll_option::Column::PollId)
            .order_by_asc(poll_option::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count votes per option of a poll, computed at query time.
    ///
    /// Options without votes are included with a count of zero.
    pub async fn tally_by_poll(&self, poll_id: i32) -> AppResult<Vec<OptionTally>> {
        self.tally_by_poll_on(self.db.as_ref(), poll_id).await
    }

    /// Count votes per option of a poll on the given connection.
    pub async fn tally_by_poll_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        poll_id: i32,
    ) -> AppResult<Vec<OptionTally>> {
        PollOption::find()
            .select_only()
            .column_as(poll_option::Column::Id, "option_id")
            .column(poll_option::Column::Text)
            .column_as(Expr::col((Vote, vote::Column::Id)).count(), "votes")
            .join(JoinType::LeftJoin, poll_option::Relation::Vote.def())
            .filter(poll_option::Column::PollId.eq(poll_id))
            .group_by(poll_option::Column::Id)
            .group_by(poll_option::Column::Text)
            .order_by_asc(poll_option::Column::Id)
            .into_model::<OptionTally>()
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert one option per text, in order, linked to `poll_id`.
    pub async fn create_many<C: ConnectionTrait>(
        &self,
        conn: &C,
        poll_id: i32,
        texts: &[String],
    ) -> AppResult<Vec<poll_option::Model>> {
        let mut created = Vec::with_capacity(texts.len());

        for text in texts {
            let model = poll_option::ActiveModel {
                text: Set(text.clone()),
                poll_id: Set(poll_id),
                ..Default::default()
            };

            let option = model.insert(conn).await.map_err(|e| {
                if StorageViolation::classify(&e).is_constraint(FK_POLL_OPTION_POLL) {
                    AppError::PollNotFound(poll_id)
                } else {
                    AppError::Database(e.to_string())
                }
            })?;
            created.push(option);
        }

        Ok(created)
    }

    /// Delete every option of a poll. Its votes must already be gone.
    pub async fn delete_by_poll<C: ConnectionTrait>(
        &self,
        conn: &C,
        poll_id: i32,
    ) -> AppResult<u64> {
        let result = PollOption::delete_many()
            .filter(poll_option::Column::PollId.eq(poll_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }
}
