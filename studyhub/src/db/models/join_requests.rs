//! Database models for study group join requests.

use crate::types::{GroupId, JoinRequestId, JoinRequestStatus, UserId};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct JoinRequestCreateDBRequest {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub message: Option<String>,
}

/// Terminal decision an admin makes on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRequestDecision {
    Approve,
    Reject,
}

impl JoinRequestDecision {
    pub fn status(self) -> JoinRequestStatus {
        match self {
            JoinRequestDecision::Approve => JoinRequestStatus::Approved,
            JoinRequestDecision::Reject => JoinRequestStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JoinRequestDBResponse {
    pub id: JoinRequestId,
    pub group_id: GroupId,
    pub user_id: UserId,
    pub message: Option<String>,
    pub status: JoinRequestStatus,
    pub requested_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<UserId>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}
