//! Record models shared by the Postgres repositories and the in-memory store.
//!
//! Each `*DBResponse` mirrors a table row (plus derived columns such as
//! `member_count` or author names where a query joins them in). `*DBRequest`
//! structs carry validated input into the store. API models in
//! [`crate::api::models`] convert from these.

pub mod groups;
pub mod join_requests;
pub mod messages;
pub mod profiles;
pub mod questions;
pub mod users;
pub mod votes;
