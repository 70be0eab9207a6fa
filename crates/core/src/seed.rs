//! Demo data for an empty database.

use pollbox_common::AppResult;

use crate::services::{CreatePollInput, CredentialsInput, PollService, UserService, VoteService};

const USERS: usize = 10;
const POLLS: usize = 5;
const SEED_PASSWORD: &str = "pass123";

/// Populate users, polls and votes when no user exists yet.
///
/// Creates `user01`..`user10`, five polls with two options (odd polls) or
/// three (even polls), and votes for each poll's first option: three
/// voters on the first three polls, two on the rest. Returns whether
/// anything was written.
pub async fn seed_if_empty(
    users: &UserService,
    polls: &PollService,
    votes: &VoteService,
) -> AppResult<bool> {
    if users.count().await? > 0 {
        tracing::debug!("Database already has users, skipping seed");
        return Ok(false);
    }

    let mut user_ids = Vec::with_capacity(USERS);
    for i in 1..=USERS {
        let user = users
            .signup(CredentialsInput {
                username: format!("user{i:02}"),
                password: SEED_PASSWORD.to_string(),
            })
            .await?;
        user_ids.push(user.id);
    }

    for i in 1..=POLLS {
        let creator_id = user_ids[(i - 1) % user_ids.len()];
        let option_count = if i % 2 == 0 { 3 } else { 2 };

        let poll = polls
            .create(
                creator_id,
                CreatePollInput {
                    title: format!("Poll {i}"),
                    options: (1..=option_count)
                        .map(|j| format!("Option {j} for Poll {i}"))
                        .collect(),
                },
            )
            .await?;

        let voter_count = if i <= 3 { 3 } else { 2 };
        if let Some(first) = poll.options.first() {
            for &user_id in &user_ids[..voter_count] {
                votes.cast(user_id, poll.id, first.id).await?;
            }
        }
    }

    tracing::info!(users = USERS, polls = POLLS, "Database seeded");
    Ok(true)
}
