//! Core domain types shared across the jobby job board.
//!
//! This crate provides the strongly-typed identifiers and the `Result`
//! alias used by every other crate in the workspace.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{
    AwardId, CompanyId, JobApplicationId, ParseIdError, ProfileId, SubscriberId, UserId,
};
