//! API request/response models.
//!
//! These are the JSON shapes of the HTTP API, kept separate from the
//! record types in [`crate::db::models`] and converted from them with `From`.

pub mod auth;
pub mod groups;
pub mod messages;
pub mod profiles;
pub mod questions;
pub mod subjects;
pub mod users;
