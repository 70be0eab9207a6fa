//! Core business logic for pollbox.
//!
//! The poll lifecycle (create, replace options, delete), the vote ledger
//! and the results aggregator, plus user accounts and demo seeding. Every
//! multi-statement write runs in one transaction through
//! [`pollbox_db::run_in_transaction`].

pub mod seed;
pub mod services;

pub use services::*;
