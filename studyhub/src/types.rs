//! Common type definitions shared across the database, store and API layers.
//!
//! # ID Types
//!
//! All entity IDs are UUIDs wrapped in type aliases:
//!
//! - [`UserId`], [`QuestionId`], [`AnswerId`]
//! - [`GroupId`], [`MessageId`], [`JoinRequestId`]
//!
//! # Vocabularies
//!
//! Grade levels, school types and roles are Postgres enums and map onto the
//! enums below through `sqlx::Type`. Subjects are free text in the schema but
//! constrained to [`SUBJECTS`] at the API boundary, and matched exactly.
//!
//! # Permission System
//!
//! There are two scopes of authority:
//!
//! - [`AppRole`]: platform-wide role from `user_roles`. Only app admins create groups.
//! - [`MembershipRole`]: a user's role inside one study group. Group admins review join requests.
//!
//! [`Permission`] names the requirement that a request failed, for error reporting.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type QuestionId = Uuid;
pub type AnswerId = Uuid;
pub type GroupId = Uuid;
pub type MessageId = Uuid;
pub type JoinRequestId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Subjects a question or study group can be filed under.
pub const SUBJECTS: &[&str] = &[
    "Math",
    "Science",
    "History",
    "English",
    "Computer Science",
    "Physics",
    "Chemistry",
    "Biology",
];

pub fn is_known_subject(subject: &str) -> bool {
    SUBJECTS.contains(&subject)
}

/// Allowed study group sizes.
pub const MEMBER_LIMIT_OPTIONS: &[i32] = &[5, 10, 15, 20, 30, 50];
pub const DEFAULT_MEMBER_LIMIT: i32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "grade_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GradeLevel {
    Elementary,
    Middle,
    High,
    College,
    Graduate,
}

impl GradeLevel {
    pub const ALL: [GradeLevel; 5] = [
        GradeLevel::Elementary,
        GradeLevel::Middle,
        GradeLevel::High,
        GradeLevel::College,
        GradeLevel::Graduate,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "school_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SchoolType {
    Public,
    Private,
    Homeschool,
    Online,
}

impl SchoolType {
    pub const ALL: [SchoolType; 4] = [SchoolType::Public, SchoolType::Private, SchoolType::Homeschool, SchoolType::Online];
}

/// Platform-wide role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "app_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AppRole {
    Admin,
    User,
}

/// Role of a user within a single study group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "membership_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    Member,
    Admin,
}

/// Join request lifecycle: `Pending -> Approved | Rejected`. Both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "join_request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JoinRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl JoinRequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JoinRequestStatus::Pending)
    }
}

/// The thing a vote is cast on. Questions and answers keep separate vote tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteTarget {
    Question(QuestionId),
    Answer(AnswerId),
}

impl VoteTarget {
    pub fn id(&self) -> Uuid {
        match self {
            VoteTarget::Question(id) | VoteTarget::Answer(id) => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            VoteTarget::Question(_) => "question",
            VoteTarget::Answer(_) => "answer",
        }
    }
}

/// An up or down vote. Stored as `vote_type` in {-1, 1}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    pub fn as_i16(self) -> i16 {
        match self {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }
}

impl TryFrom<i16> for VoteValue {
    type Error = i16;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(VoteValue::Up),
            -1 => Ok(VoteValue::Down),
            other => Err(other),
        }
    }
}

/// The authority a request was missing when it was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Authenticated user acting on their own data
    Authenticated,
    /// App role `admin`
    AppAdmin,
    /// Any membership in the target group
    GroupMember,
    /// Membership role `admin` in the target group
    GroupAdmin,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Authenticated => write!(f, "authenticated user"),
            Permission::AppAdmin => write!(f, "platform admin"),
            Permission::GroupMember => write!(f, "group member"),
            Permission::GroupAdmin => write!(f, "group admin"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }

    #[test]
    fn test_vote_value_conversion() {
        assert_eq!(VoteValue::try_from(1), Ok(VoteValue::Up));
        assert_eq!(VoteValue::try_from(-1), Ok(VoteValue::Down));
        assert_eq!(VoteValue::try_from(0), Err(0));
        assert_eq!(VoteValue::try_from(2), Err(2));
        assert_eq!(VoteValue::Down.as_i16(), -1);
    }

    #[test]
    fn test_subjects_are_case_sensitive() {
        assert!(is_known_subject("Math"));
        assert!(is_known_subject("Computer Science"));
        assert!(!is_known_subject("math"));
        assert!(!is_known_subject("Art"));
    }

    #[test]
    fn test_enum_serialization_is_lowercase() {
        assert_eq!(serde_json::to_string(&GradeLevel::College).unwrap(), "\"college\"");
        assert_eq!(serde_json::to_string(&MembershipRole::Admin).unwrap(), "\"admin\"");
        let status: JoinRequestStatus = serde_json::from_str("\"rejected\"").unwrap();
        assert!(status.is_terminal());
        assert!(!JoinRequestStatus::Pending.is_terminal());
    }
}
