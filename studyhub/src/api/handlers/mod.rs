//! Axum route handlers.
//!
//! Handlers are thin: they extract the caller and the request, delegate to
//! [`crate::services`] or the [`crate::store::Store`], and convert the result
//! into an API model. Every handler under `/api/v1` requires an authenticated
//! [`CurrentUser`](crate::api::models::users::CurrentUser) except `GET /subjects`.

pub mod auth;
pub mod groups;
pub mod messages;
pub mod profiles;
pub mod questions;
pub mod subjects;
pub mod users;
