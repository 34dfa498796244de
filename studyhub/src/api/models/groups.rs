//! API request/response models for study groups, memberships and join requests.

use crate::db::models::groups::{MemberDBResponse, MembershipDBResponse, StudyGroupDBResponse};
use crate::db::models::join_requests::{JoinRequestDBResponse, JoinRequestDecision};
use crate::db::models::profiles::display_name;
use crate::services::groups::GroupAccess;
use crate::types::{GroupId, JoinRequestId, JoinRequestStatus, MembershipRole, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GroupCreate {
    pub name: String,
    pub description: Option<String>,
    pub subject: String,
    /// Defaults to true
    pub is_public: Option<bool>,
    /// One of 5, 10, 15, 20, 30, 50. Defaults to 20
    pub member_limit: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: GroupId,
    pub name: String,
    pub description: Option<String>,
    pub subject: String,
    #[schema(value_type = String, format = "uuid")]
    pub created_by: UserId,
    pub is_public: bool,
    pub member_limit: i32,
    pub member_count: i64,
    /// Whether the caller belongs to this group
    pub is_member: bool,
    pub created_at: DateTime<Utc>,
}

impl GroupResponse {
    pub fn new(db: StudyGroupDBResponse, is_member: bool) -> Self {
        Self {
            id: db.id,
            name: db.name,
            description: db.description,
            subject: db.subject,
            created_by: db.created_by,
            is_public: db.is_public,
            member_limit: db.member_limit,
            member_count: db.member_count,
            is_member,
            created_at: db.created_at,
        }
    }
}

/// Query parameters for listing study groups
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListGroupsQuery {
    /// Case-insensitive substring match over name and description
    pub search: Option<String>,
    /// Exact subject match; `all` disables the filter
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemberResponse {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub display_name: String,
    pub role: MembershipRole,
    pub joined_at: DateTime<Utc>,
}

impl From<MemberDBResponse> for MemberResponse {
    fn from(db: MemberDBResponse) -> Self {
        Self {
            display_name: display_name(db.first_name.as_deref(), db.last_name.as_deref()),
            user_id: db.user_id,
            role: db.role,
            joined_at: db.joined_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MembershipResponse {
    #[schema(value_type = String, format = "uuid")]
    pub group_id: GroupId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub role: MembershipRole,
    pub joined_at: DateTime<Utc>,
}

impl From<MembershipDBResponse> for MembershipResponse {
    fn from(db: MembershipDBResponse) -> Self {
        Self {
            group_id: db.group_id,
            user_id: db.user_id,
            role: db.role,
            joined_at: db.joined_at,
        }
    }
}

/// What the caller may do in a group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct GroupAccessResponse {
    pub is_member: bool,
    pub is_admin: bool,
    pub is_full: bool,
    pub has_pending_request: bool,
    pub can_join: bool,
    pub can_request: bool,
}

impl From<GroupAccess> for GroupAccessResponse {
    fn from(access: GroupAccess) -> Self {
        Self {
            is_member: access.is_member,
            is_admin: access.is_admin,
            is_full: access.is_full,
            has_pending_request: access.has_pending_request,
            can_join: access.can_join(),
            can_request: access.can_request(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupDetailResponse {
    pub group: GroupResponse,
    pub members: Vec<MemberResponse>,
    pub access: GroupAccessResponse,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct JoinRequestCreate {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JoinRequestResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: JoinRequestId,
    #[schema(value_type = String, format = "uuid")]
    pub group_id: GroupId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub requester_name: String,
    pub message: Option<String>,
    pub status: JoinRequestStatus,
    pub requested_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub reviewed_by: Option<UserId>,
}

impl From<JoinRequestDBResponse> for JoinRequestResponse {
    fn from(db: JoinRequestDBResponse) -> Self {
        Self {
            requester_name: display_name(db.first_name.as_deref(), db.last_name.as_deref()),
            id: db.id,
            group_id: db.group_id,
            user_id: db.user_id,
            message: db.message,
            status: db.status,
            requested_at: db.requested_at,
            reviewed_at: db.reviewed_at,
            reviewed_by: db.reviewed_by,
        }
    }
}

/// Query parameters for listing join requests
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListJoinRequestsQuery {
    /// Defaults to `pending`
    pub status: Option<JoinRequestStatus>,
}

/// Review decision. Only `approved` and `rejected` are accepted.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct JoinRequestReview {
    pub status: JoinRequestStatus,
}

impl JoinRequestReview {
    pub fn decision(&self) -> Option<JoinRequestDecision> {
        match self.status {
            JoinRequestStatus::Approved => Some(JoinRequestDecision::Approve),
            JoinRequestStatus::Rejected => Some(JoinRequestDecision::Reject),
            JoinRequestStatus::Pending => None,
        }
    }
}
