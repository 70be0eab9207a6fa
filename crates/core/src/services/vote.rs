//! Vote service.

use std::sync::Arc;

use pollbox_common::{AppError, AppResult};
use pollbox_db::{
    entities::vote,
    repositories::{PollOptionRepository, PollRepository, UserRepository, VoteRepository},
    run_in_transaction,
};
use sea_orm::{DatabaseConnection, DatabaseTransaction};

use super::results::PollResults;

/// Records at most one vote per user and poll.
#[derive(Clone)]
pub struct VoteService {
    db: Arc<DatabaseConnection>,
    user_repo: UserRepository,
    poll_repo: PollRepository,
    option_repo: PollOptionRepository,
    vote_repo: VoteRepository,
}

impl VoteService {
    /// Create a new vote service.
    #[must_use]
    pub const fn new(
        db: Arc<DatabaseConnection>,
        user_repo: UserRepository,
        poll_repo: PollRepository,
        option_repo: PollOptionRepository,
        vote_repo: VoteRepository,
    ) -> Self {
        Self {
            db,
            user_repo,
            poll_repo,
            option_repo,
            vote_repo,
        }
    }

    /// Cast a vote for `option_id` on `poll_id`.
    ///
    /// Checks run in order, each with its own error:
    /// unknown user ([`AppError::Unauthorized`]), existing vote
    /// ([`AppError::Conflict`]), unknown poll ([`AppError::PollNotFound`]),
    /// unknown option or an option of another poll
    /// ([`AppError::OptionNotFound`]). The duplicate check only produces a
    /// clean error early; two concurrent casts that both pass it are
    /// separated by the unique index on insert.
    pub async fn cast(&self, user_id: i32, poll_id: i32, option_id: i32) -> AppResult<vote::Model> {
        let repos = self.clone();

        let vote = run_in_transaction(self.db.as_ref(), "cast_vote", move |txn| {
            Box::pin(async move { repos.record(txn, user_id, poll_id, option_id).await })
        })
        .await?;

        tracing::info!(vote_id = vote.id, user_id, poll_id, option_id, "Vote cast");
        Ok(vote)
    }

    /// Cast a vote and return the poll's counts as of that vote.
    ///
    /// The counts are read in the same transaction as the insert, so a
    /// recorded vote is always answered with results that include it.
    pub async fn cast_with_results(
        &self,
        user_id: i32,
        poll_id: i32,
        option_id: i32,
    ) -> AppResult<PollResults> {
        let repos = self.clone();

        let (vote, results) =
            run_in_transaction(self.db.as_ref(), "cast_vote", move |txn| {
                Box::pin(async move {
                    let vote = repos.record(txn, user_id, poll_id, option_id).await?;
                    let results = repos.option_repo.tally_by_poll_on(txn, poll_id).await?;
                    Ok((vote, PollResults { poll_id, results }))
                })
            })
            .await?;

        tracing::info!(vote_id = vote.id, user_id, poll_id, option_id, "Vote cast");
        Ok(results)
    }

    async fn record(
        &self,
        txn: &DatabaseTransaction,
        user_id: i32,
        poll_id: i32,
        option_id: i32,
    ) -> AppResult<vote::Model> {
        if self.user_repo.find_by_id_on(txn, user_id).await?.is_none() {
            return Err(AppError::Unauthorized);
        }

        if self
            .vote_repo
            .find_by_user_and_poll_on(txn, user_id, poll_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "User has already voted on this poll".to_string(),
            ));
        }

        if self.poll_repo.find_by_id_on(txn, poll_id).await?.is_none() {
            return Err(AppError::PollNotFound(poll_id));
        }

        match self.option_repo.find_by_id_on(txn, option_id).await? {
            Some(option) if option.poll_id == poll_id => {}
            _ => return Err(AppError::OptionNotFound(option_id)),
        }

        self.vote_repo.create(txn, user_id, poll_id, option_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pollbox_db::entities::{poll, poll_option, user};
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};

    fn create_test_user(id: i32) -> user::Model {
        user::Model {
            id,
            username: format!("user{id:02}"),
            password_hash: "hash".to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn create_test_poll(id: i32) -> poll::Model {
        poll::Model {
            id,
            title: "Lunch".to_string(),
            creator_id: 1,
            created_at: Utc::now().into(),
        }
    }

    fn create_test_option(id: i32, poll_id: i32) -> poll_option::Model {
        poll_option::Model {
            id,
            text: format!("Option {id}"),
            poll_id,
        }
    }

    fn create_test_vote(id: i32, user_id: i32, poll_id: i32, option_id: i32) -> vote::Model {
        vote::Model {
            id,
            user_id,
            poll_id,
            option_id,
            created_at: Utc::now().into(),
        }
    }

    fn create_test_service(db: MockDatabase) -> VoteService {
        let db = Arc::new(db.into_connection());
        VoteService::new(
            Arc::clone(&db),
            UserRepository::new(Arc::clone(&db)),
            PollRepository::new(Arc::clone(&db)),
            PollOptionRepository::new(Arc::clone(&db)),
            VoteRepository::new(db),
        )
    }

    #[tokio::test]
    async fn test_cast_vote_success() {
        let service = create_test_service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_user(2)]])
                .append_query_results([Vec::<vote::Model>::new()])
                .append_query_results([[create_test_poll(1)]])
                .append_query_results([[create_test_option(10, 1)]])
                .append_query_results([[create_test_vote(100, 2, 1, 10)]]),
        );

        let vote = service.cast(2, 1, 10).await.unwrap();

        assert_eq!(vote.id, 100);
        assert_eq!(vote.option_id, 10);
    }

    #[tokio::test]
    async fn test_cast_vote_unknown_user_is_unauthorized() {
        let service = create_test_service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()]),
        );

        assert!(matches!(
            service.cast(99, 1, 10).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_cast_second_vote_is_conflict() {
        let service = create_test_service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_user(2)]])
                .append_query_results([[create_test_vote(100, 2, 1, 10)]]),
        );

        assert!(matches!(
            service.cast(2, 1, 11).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_cast_vote_missing_poll() {
        let service = create_test_service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_user(2)]])
                .append_query_results([Vec::<vote::Model>::new()])
                .append_query_results([Vec::<poll::Model>::new()]),
        );

        assert!(matches!(
            service.cast(2, 7, 10).await,
            Err(AppError::PollNotFound(7))
        ));
    }

    #[tokio::test]
    async fn test_cast_vote_for_option_of_another_poll() {
        let service = create_test_service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_user(2)]])
                .append_query_results([Vec::<vote::Model>::new()])
                .append_query_results([[create_test_poll(1)]])
                .append_query_results([[create_test_option(20, 2)]]),
        );

        assert!(matches!(
            service.cast(2, 1, 20).await,
            Err(AppError::OptionNotFound(20))
        ));
    }

    #[tokio::test]
    async fn test_cast_vote_missing_option() {
        let service = create_test_service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_user(2)]])
                .append_query_results([Vec::<vote::Model>::new()])
                .append_query_results([[create_test_poll(1)]])
                .append_query_results([Vec::<poll_option::Model>::new()]),
        );

        assert!(matches!(
            service.cast(2, 1, 404).await,
            Err(AppError::OptionNotFound(404))
        ));
    }

    #[tokio::test]
    async fn test_cast_with_results_includes_new_vote() {
        let service = create_test_service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_user(2)]])
                .append_query_results([Vec::<vote::Model>::new()])
                .append_query_results([[create_test_poll(1)]])
                .append_query_results([[create_test_option(10, 1)]])
                .append_query_results([[create_test_vote(100, 2, 1, 10)]])
                .append_query_results([vec![
                    btreemap! {
                        "option_id" => Into::<Value>::into(10),
                        "text" => Into::<Value>::into("Option 10"),
                        "votes" => Into::<Value>::into(1i64),
                    },
                    btreemap! {
                        "option_id" => Into::<Value>::into(11),
                        "text" => Into::<Value>::into("Option 11"),
                        "votes" => Into::<Value>::into(0i64),
                    },
                ]]),
        );

        let results = service.cast_with_results(2, 1, 10).await.unwrap();

        assert_eq!(results.poll_id, 1);
        assert_eq!(results.total_votes(), 1);
        assert_eq!(results.results[0].option_id, 10);
        assert_eq!(results.results[0].votes, 1);
    }

    #[tokio::test]
    async fn test_cast_with_results_failed_tally_rolls_back() {
        let service = create_test_service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_user(2)]])
                .append_query_results([Vec::<vote::Model>::new()])
                .append_query_results([[create_test_poll(1)]])
                .append_query_results([[create_test_option(10, 1)]])
                .append_query_results([[create_test_vote(100, 2, 1, 10)]])
                .append_query_errors([sea_orm::DbErr::Custom("connection reset".to_string())]),
        );

        assert!(matches!(
            service.cast_with_results(2, 1, 10).await,
            Err(AppError::Database(_))
        ));
    }
}
