//! Database models for question and answer votes.

use crate::types::{UserId, VoteValue};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A stored vote, from either `question_votes` or `answer_votes`.
#[derive(Debug, Clone)]
pub struct VoteDBResponse {
    pub id: Uuid,
    /// The question or answer id
    pub target_id: Uuid,
    pub user_id: UserId,
    pub value: VoteValue,
    pub created_at: DateTime<Utc>,
}
