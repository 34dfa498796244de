//! Authentication.
//!
//! Users register and log in with email and password. A successful login
//! issues a signed JWT, returned in an HTTP-only session cookie. API clients
//! may send the same token as `Authorization: Bearer <token>`.
//!
//! # Modules
//!
//! - [`current_user`]: the [`CurrentUser`](crate::api::models::users::CurrentUser) extractor
//! - [`password`]: password hashing and verification using Argon2
//! - [`session`]: session token creation, verification and cookies

pub mod current_user;
pub mod password;
pub mod session;
