//! Database models for group chat messages.

use super::profiles::display_name;
use crate::types::{GroupId, MessageId, UserId};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct MessageCreateDBRequest {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub content: String,
}

/// A message joined with its author's profile names.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct MessageDBResponse {
    pub id: MessageId,
    pub group_id: GroupId,
    pub user_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl MessageDBResponse {
    pub fn author_name(&self) -> String {
        display_name(self.first_name.as_deref(), self.last_name.as_deref())
    }
}
