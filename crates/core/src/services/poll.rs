//! Poll service.
//!
//! Owns the poll lifecycle. Creation inserts the poll and all of its
//! options in one transaction. Replacing the options and deleting the poll
//! both lock the poll row, check ownership, then remove dependents in
//! foreign-key order: votes, options, and finally the poll itself.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use pollbox_common::{AppError, AppResult, config::PollConfig};
use pollbox_db::{
    entities::{poll, poll_option},
    repositories::{OptionTally, PollOptionRepository, PollRepository, VoteRepository},
    run_in_transaction,
};
use sea_orm::{DatabaseConnection, DatabaseTransaction, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    db: Arc<DatabaseConnection>,
    poll_repo: PollRepository,
    option_repo: PollOptionRepository,
    vote_repo: VoteRepository,
    limits: PollConfig,
}

/// Input for creating a poll.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePollInput {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,

    #[validate(length(min = 2, message = "at least two options are required"))]
    pub options: Vec<String>,
}

/// Input for replacing a poll's options.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePollInput {
    #[validate(length(min = 2, message = "at least two options are required"))]
    pub options: Vec<String>,
}

/// An option without its count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub id: i32,
    pub text: String,
}

impl From<poll_option::Model> for OptionView {
    fn from(option: poll_option::Model) -> Self {
        Self {
            id: option.id,
            text: option.text,
        }
    }
}

/// A poll with its options in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollView {
    pub id: i32,
    pub title: String,
    pub creator_id: i32,
    pub options: Vec<OptionView>,
}

impl PollView {
    fn new(poll: poll::Model, options: Vec<poll_option::Model>) -> Self {
        Self {
            id: poll.id,
            title: poll.title,
            creator_id: poll.creator_id,
            options: options.into_iter().map(OptionView::from).collect(),
        }
    }
}

/// An option with its live vote count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionCount {
    pub id: i32,
    pub text: String,
    pub votes: i64,
}

impl From<OptionTally> for OptionCount {
    fn from(tally: OptionTally) -> Self {
        Self {
            id: tally.option_id,
            text: tally.text,
            votes: tally.votes,
        }
    }
}

/// A poll with live vote counts per option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollDetail {
    pub id: i32,
    pub title: String,
    pub creator_id: i32,
    pub options: Vec<OptionCount>,
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub const fn new(
        db: Arc<DatabaseConnection>,
        poll_repo: PollRepository,
        option_repo: PollOptionRepository,
        vote_repo: VoteRepository,
        limits: PollConfig,
    ) -> Self {
        Self {
            db,
            poll_repo,
            option_repo,
            vote_repo,
            limits,
        }
    }

    /// Create a poll and its options atomically.
    ///
    /// A `creator_id` that references no user fails with
    /// [`AppError::Unauthorized`] and leaves nothing behind.
    pub async fn create(&self, creator_id: i32, input: CreatePollInput) -> AppResult<PollView> {
        input.validate()?;
        let title = self.check_text("title", &input.title)?;
        let texts = self.check_options(&input.options)?;

        let poll_repo = self.poll_repo.clone();
        let option_repo = self.option_repo.clone();

        let view = run_in_transaction(self.db.as_ref(), "create_poll", move |txn| {
            Box::pin(async move {
                let model = poll::ActiveModel {
                    title: Set(title),
                    creator_id: Set(creator_id),
                    created_at: Set(Utc::now().into()),
                    ..Default::default()
                };
                let poll = poll_repo.create(txn, model).await?;
                let options = option_repo.create_many(txn, poll.id, &texts).await?;
                Ok(PollView::new(poll, options))
            })
        })
        .await?;

        tracing::info!(
            poll_id = view.id,
            creator_id,
            options = view.options.len(),
            "Poll created"
        );
        Ok(view)
    }

    /// Get a poll with live vote counts.
    pub async fn get(&self, poll_id: i32) -> AppResult<PollDetail> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        let tally = self.option_repo.tally_by_poll(poll_id).await?;

        Ok(PollDetail {
            id: poll.id,
            title: poll.title,
            creator_id: poll.creator_id,
            options: tally.into_iter().map(OptionCount::from).collect(),
        })
    }

    /// List every poll with its options, ordered by ID.
    pub async fn list(&self) -> AppResult<Vec<PollView>> {
        let polls = self.poll_repo.find_all().await?;
        let ids: Vec<i32> = polls.iter().map(|p| p.id).collect();

        let mut by_poll: HashMap<i32, Vec<poll_option::Model>> = HashMap::new();
        for option in self.option_repo.find_by_polls(&ids).await? {
            by_poll.entry(option.poll_id).or_default().push(option);
        }

        Ok(polls
            .into_iter()
            .map(|poll| {
                let options = by_poll.remove(&poll.id).unwrap_or_default();
                PollView::new(poll, options)
            })
            .collect())
    }

    /// Replace every option of a poll. All votes on the poll are deleted.
    pub async fn update_options(
        &self,
        poll_id: i32,
        caller_id: i32,
        input: UpdatePollInput,
    ) -> AppResult<PollView> {
        let poll_repo = self.poll_repo.clone();
        let option_repo = self.option_repo.clone();
        let vote_repo = self.vote_repo.clone();
        let limits = self.limits.clone();

        let view = run_in_transaction(self.db.as_ref(), "update_poll_options", move |txn| {
            Box::pin(async move {
                let poll = lock_owned_poll(&poll_repo, txn, poll_id, caller_id).await?;

                input.validate()?;
                let texts = check_options(&limits, &input.options)?;

                let votes = vote_repo.delete_by_poll(txn, poll_id).await?;
                option_repo.delete_by_poll(txn, poll_id).await?;
                let options = option_repo.create_many(txn, poll_id, &texts).await?;

                tracing::info!(poll_id, votes_cleared = votes, "Poll options replaced");
                Ok(PollView::new(poll, options))
            })
        })
        .await?;

        Ok(view)
    }

    /// Delete a poll with its options and votes.
    pub async fn delete(&self, poll_id: i32, caller_id: i32) -> AppResult<()> {
        let poll_repo = self.poll_repo.clone();
        let option_repo = self.option_repo.clone();
        let vote_repo = self.vote_repo.clone();

        run_in_transaction(self.db.as_ref(), "delete_poll", move |txn| {
            Box::pin(async move {
                lock_owned_poll(&poll_repo, txn, poll_id, caller_id).await?;

                vote_repo.delete_by_poll(txn, poll_id).await?;
                option_repo.delete_by_poll(txn, poll_id).await?;
                poll_repo.delete(txn, poll_id).await?;
                Ok(())
            })
        })
        .await?;

        tracing::info!(poll_id, caller_id, "Poll deleted");
        Ok(())
    }

    fn check_text(&self, field: &str, text: &str) -> AppResult<String> {
        check_text(&self.limits, field, text)
    }

    fn check_options(&self, options: &[String]) -> AppResult<Vec<String>> {
        check_options(&self.limits, options)
    }
}

/// Load the poll under a row lock and require `caller_id` to be its creator.
async fn lock_owned_poll(
    poll_repo: &PollRepository,
    txn: &DatabaseTransaction,
    poll_id: i32,
    caller_id: i32,
) -> AppResult<poll::Model> {
    let poll = poll_repo
        .find_for_update(txn, poll_id)
        .await?
        .ok_or(AppError::PollNotFound(poll_id))?;

    if poll.creator_id != caller_id {
        return Err(AppError::Forbidden(
            "Only the poll creator can modify this poll".to_string(),
        ));
    }

    Ok(poll)
}

/// Reject whitespace-only text and text over the configured length. The
/// text itself is stored as sent.
fn check_text(limits: &PollConfig, field: &str, text: &str) -> AppResult<String> {
    if text.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    if let Some(max) = limits
        .max_text_length
        .filter(|&max| text.chars().count() > max)
    {
        return Err(AppError::Validation(format!(
            "{field} is too long (max {max} characters)"
        )));
    }
    Ok(text.to_string())
}

fn check_options(limits: &PollConfig, options: &[String]) -> AppResult<Vec<String>> {
    if options.len() < 2 {
        return Err(AppError::Validation(
            "at least two options are required".to_string(),
        ));
    }
    if let Some(max) = limits.max_options.filter(|&max| options.len() > max) {
        return Err(AppError::Validation(format!(
            "a poll cannot have more than {max} options"
        )));
    }
    options
        .iter()
        .map(|text| check_text(limits, "option", text))
        .collect()
}
