//! Business logic services.

#![allow(missing_docs)]

pub mod poll;
pub mod results;
pub mod user;
pub mod vote;

pub use poll::{
    CreatePollInput, OptionCount, OptionView, PollDetail, PollService, PollView, UpdatePollInput,
};
pub use results::{OptionVoters, PollResults, ResultsService};
pub use user::{CredentialsInput, UserService, UserSummary};
pub use vote::VoteService;
