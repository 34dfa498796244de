//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed `PgConnection` (pooled or transactional)
//! and returns records from [`crate::db::models`].
//!
//! # Available Repositories
//!
//! - [`Users`]: accounts and app roles
//! - [`Profiles`]: one profile per user
//! - [`Questions`] and [`Answers`]: Q&A content
//! - [`Votes`]: question and answer votes
//! - [`StudyGroups`] and [`Memberships`]: groups and who belongs to them
//! - [`JoinRequests`]: requests to join non-public groups
//! - [`Messages`]: group chat
//!
//! Content tables implement the [`Repository`] trait (`create`, `get_by_id`,
//! `list`); the rest expose narrower inherent methods.

pub mod answers;
pub mod join_requests;
pub mod memberships;
pub mod messages;
pub mod profiles;
pub mod questions;
pub mod repository;
pub mod study_groups;
pub mod users;
pub mod votes;

pub use answers::Answers;
pub use join_requests::JoinRequests;
pub use memberships::Memberships;
pub use messages::Messages;
pub use profiles::Profiles;
pub use questions::Questions;
pub use repository::Repository;
pub use study_groups::StudyGroups;
pub use users::Users;
pub use votes::Votes;
