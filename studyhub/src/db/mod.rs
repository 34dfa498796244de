//! Database layer for data persistence and access.
//!
//! This module implements the Postgres side of the data access layer using SQLx.
//! It follows the Repository pattern; the [`crate::store`] module composes the
//! repositories into the narrow interface the services call.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Services   │  (vote toggling, join workflow, profiles)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │    Store    │  (crate::store - Postgres or in-memory)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries per table)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations, one per table family
//! - [`models`]: Record structures shared by both store implementations
//! - [`errors`]: Database-specific error types
//!
//! # Transactions
//!
//! Repositories borrow a `PgConnection`, so they work equally on a pooled
//! connection or inside a transaction:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let group = StudyGroups::new(&mut tx).create(&request).await?;
//! Memberships::new(&mut tx).add(group.id, request.created_by, MembershipRole::Admin).await?;
//! tx.commit().await?;
//! ```
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and are embedded through [`crate::migrator`].
//! Vote totals and answer counts are maintained by triggers defined there, and
//! inserts into `group_messages` emit a `group_message_inserted` notification.

pub mod errors;
pub mod handlers;
pub mod models;
