//! Database models for study groups and memberships, plus the group search filter.

use super::questions::{contains_ci, normalize_search, normalize_subject};
use crate::types::{GroupId, MembershipRole, UserId};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StudyGroupCreateDBRequest {
    pub name: String,
    pub description: Option<String>,
    pub subject: String,
    pub created_by: UserId,
    pub is_public: bool,
    pub member_limit: i32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StudyGroupDBResponse {
    pub id: GroupId,
    pub name: String,
    pub description: Option<String>,
    pub subject: String,
    pub created_by: UserId,
    pub is_public: bool,
    pub member_limit: i32,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudyGroupDBResponse {
    /// Advisory capacity flag. Not enforced atomically with inserts.
    pub fn is_full(&self) -> bool {
        self.member_count >= i64::from(self.member_limit)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MembershipDBResponse {
    pub id: Uuid,
    pub group_id: GroupId,
    pub user_id: UserId,
    pub role: MembershipRole,
    pub joined_at: DateTime<Utc>,
}

/// A membership joined with the member's profile names.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MemberDBResponse {
    pub user_id: UserId,
    pub role: MembershipRole,
    pub joined_at: DateTime<Utc>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Filter for listing public study groups.
///
/// `search` is a case-insensitive substring match over name and description.
/// `subject` is an exact, case-sensitive match.
#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    pub search: Option<String>,
    pub subject: Option<String>,
}

impl GroupFilter {
    pub fn new(search: Option<String>, subject: Option<String>) -> Self {
        Self {
            search: normalize_search(search),
            subject: normalize_subject(subject),
        }
    }

    pub fn matches(&self, group: &StudyGroupDBResponse) -> bool {
        if !group.is_public {
            return false;
        }
        if let Some(subject) = &self.subject
            && group.subject != *subject
        {
            return false;
        }
        match &self.search {
            None => true,
            Some(term) => contains_ci(&group.name, term) || group.description.as_deref().is_some_and(|d| contains_ci(d, term)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str, description: Option<&str>, subject: &str, is_public: bool) -> StudyGroupDBResponse {
        StudyGroupDBResponse {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.map(str::to_string),
            subject: subject.to_string(),
            created_by: Uuid::new_v4(),
            is_public,
            member_limit: 20,
            member_count: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_group_search_over_name_and_description() {
        let filter = GroupFilter::new(Some("exam".to_string()), None);
        assert!(filter.matches(&group("Exam Prep", None, "Math", true)));
        assert!(filter.matches(&group("Physics crew", Some("Preparing for EXAMS"), "Physics", true)));
        assert!(!filter.matches(&group("Physics crew", None, "Physics", true)));
    }

    #[test]
    fn test_private_groups_are_never_listed() {
        let filter = GroupFilter::default();
        assert!(!filter.matches(&group("Secret", None, "Math", false)));
    }

    #[test]
    fn test_is_full() {
        let mut g = group("Full", None, "Math", true);
        g.member_limit = 5;
        g.member_count = 4;
        assert!(!g.is_full());
        g.member_count = 5;
        assert!(g.is_full());
    }
}
