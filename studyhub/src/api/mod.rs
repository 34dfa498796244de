//! HTTP API: route handlers and their request/response models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: JSON shapes of requests and responses
//!
//! # API Structure
//!
//! - **Authentication** (`/authentication/*`): register, login, logout
//! - **Users** (`/api/v1/users/current`): the caller
//! - **Profile** (`/api/v1/profile`): the caller's profile
//! - **Subjects** (`/api/v1/subjects`): fixed vocabularies, public
//! - **Questions** (`/api/v1/questions/*`, `/api/v1/answers/*`): questions, answers and votes
//! - **Groups** (`/api/v1/groups/*`): study groups, memberships and join requests
//! - **Messages** (`/api/v1/groups/{id}/messages/*`): group chat and its event stream
//!
//! Documentation is generated with `utoipa` (see [`crate::openapi`]) and
//! served at `/docs`.

pub mod handlers;
pub mod models;
