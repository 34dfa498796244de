//! Application rules layered over the [`crate::store::Store`] primitives.
//!
//! - [`voting`]: toggle semantics for question and answer votes
//! - [`groups`]: group creation, direct joins, the join-request workflow and access flags
//! - [`profiles`]: lazy profile creation and profile validation
//!
//! Services take the store and the acting user explicitly and return
//! [`crate::errors::Error`], so handlers stay thin.

pub mod groups;
pub mod profiles;
pub mod voting;
