//! Repositories.
//!
//! Reads run against the shared pool; every write takes the connection it
//! should run on, so the services can group writes into one transaction.

pub mod poll;
pub mod poll_option;
pub mod user;
pub mod vote;

pub use poll::PollRepository;
pub use poll_option::{OptionTally, PollOptionRepository};
pub use user::UserRepository;
pub use vote::{VoteRepository, Voter};
