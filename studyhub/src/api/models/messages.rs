//! API request/response models for group chat.

use crate::db::models::messages::MessageDBResponse;
use crate::types::{GroupId, MessageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MessageCreate {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: MessageId,
    #[schema(value_type = String, format = "uuid")]
    pub group_id: GroupId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    /// "First Last", or "Anonymous User" when the author has no profile
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<MessageDBResponse> for MessageResponse {
    fn from(db: MessageDBResponse) -> Self {
        Self {
            author_name: db.author_name(),
            id: db.id,
            group_id: db.group_id,
            user_id: db.user_id,
            content: db.content,
            created_at: db.created_at,
        }
    }
}
