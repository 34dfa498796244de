//! Vote toggling.
//!
//! A user holds at most one vote per target. Casting the value they already
//! hold retracts it; casting the other value flips it; otherwise a new vote is
//! recorded. The lookup and the write are separate store calls, so two
//! concurrent casts by the same user can interleave. The loser of a racing
//! insert gets a unique violation (409), and racing updates resolve as last
//! write wins.

use serde::Serialize;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::db::models::votes::VoteDBResponse;
use crate::errors::{Error, Result};
use crate::store::Store;
use crate::types::{UserId, VoteTarget, VoteValue, abbrev_uuid};

/// What to do with a cast, given the user's existing vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    Insert,
    Update,
    Delete,
}

impl VoteAction {
    pub fn decide(existing: Option<VoteValue>, requested: VoteValue) -> Self {
        match existing {
            None => VoteAction::Insert,
            Some(current) if current == requested => VoteAction::Delete,
            Some(_) => VoteAction::Update,
        }
    }
}

/// Result of a cast, as reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VoteOutcome {
    /// A new vote was recorded
    Inserted,
    /// The existing vote was flipped to the other value
    Changed,
    /// The same value was cast again, so the vote was removed
    Retracted,
}

/// Cast `value` on `target` as `user_id`. The target must already exist.
#[instrument(skip(store, user_id, target), fields(kind = target.kind(), target_id = %abbrev_uuid(&target.id())), err)]
pub async fn cast_vote(store: &dyn Store, user_id: UserId, target: VoteTarget, value: VoteValue) -> Result<VoteOutcome> {
    let existing: Option<VoteDBResponse> = store.find_vote(target, user_id).await?;

    let outcome = match (VoteAction::decide(existing.as_ref().map(|v| v.value), value), existing) {
        (VoteAction::Insert, _) => {
            store.insert_vote(target, user_id, value).await?;
            VoteOutcome::Inserted
        }
        (VoteAction::Delete, Some(vote)) => {
            store.delete_vote(target, vote.id).await?;
            VoteOutcome::Retracted
        }
        (VoteAction::Update, Some(vote)) => {
            store.update_vote(target, vote.id, value).await?;
            VoteOutcome::Changed
        }
        (action, None) => {
            return Err(Error::Internal {
                operation: format!("apply {action:?} without an existing vote"),
            });
        }
    };

    debug!("Vote by {} resolved as {:?}", abbrev_uuid(&user_id), outcome);
    Ok(outcome)
}
