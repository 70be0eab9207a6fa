//! Results service.
//!
//! Read-only aggregation. Counts and voter lists are computed from the
//! vote rows at query time; nothing is cached or maintained incrementally.

use pollbox_common::{AppError, AppResult};
use pollbox_db::repositories::{
    OptionTally, PollOptionRepository, PollRepository, VoteRepository, Voter,
};
use serde::Serialize;

/// Vote counts for every option of a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollResults {
    pub poll_id: i32,
    pub results: Vec<OptionTally>,
}

impl PollResults {
    /// Total number of votes across all options.
    #[must_use]
    pub fn total_votes(&self) -> i64 {
        self.results.iter().map(|r| r.votes).sum()
    }
}

/// Users who voted for an option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionVoters {
    pub option_id: i32,
    pub voters: Vec<Voter>,
}

/// Results service for business logic.
#[derive(Clone)]
pub struct ResultsService {
    poll_repo: PollRepository,
    option_repo: PollOptionRepository,
    vote_repo: VoteRepository,
}

impl ResultsService {
    /// Create a new results service.
    #[must_use]
    pub const fn new(
        poll_repo: PollRepository,
        option_repo: PollOptionRepository,
        vote_repo: VoteRepository,
    ) -> Self {
        Self {
            poll_repo,
            option_repo,
            vote_repo,
        }
    }

    /// Live vote counts for a poll, one entry per option including zeros.
    pub async fn results(&self, poll_id: i32) -> AppResult<PollResults> {
        if self.poll_repo.find_by_id(poll_id).await?.is_none() {
            return Err(AppError::PollNotFound(poll_id));
        }

        let results = self.option_repo.tally_by_poll(poll_id).await?;
        Ok(PollResults { poll_id, results })
    }

    /// Users who voted for an option.
    pub async fn voters(&self, option_id: i32) -> AppResult<OptionVoters> {
        if self.option_repo.find_by_id(option_id).await?.is_none() {
            return Err(AppError::OptionNotFound(option_id));
        }

        self.collect_voters(option_id).await
    }

    /// Users who voted for an option, requiring the option to belong to `poll_id`.
    pub async fn voters_in_poll(&self, poll_id: i32, option_id: i32) -> AppResult<OptionVoters> {
        match self.option_repo.find_by_id(option_id).await? {
            Some(option) if option.poll_id == poll_id => self.collect_voters(option_id).await,
            _ => Err(AppError::OptionNotFound(option_id)),
        }
    }

    async fn collect_voters(&self, option_id: i32) -> AppResult<OptionVoters> {
        let voters = self.vote_repo.voters_by_option(option_id).await?;
        Ok(OptionVoters { option_id, voters })
    }
}
