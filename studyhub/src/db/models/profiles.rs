//! Database models for user profiles.

use crate::types::{GradeLevel, SchoolType, UserId};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Display name used when an author has no profile or an empty one.
pub const ANONYMOUS_DISPLAY_NAME: &str = "Anonymous User";

/// Render "First Last" from optional profile names, falling back to
/// [`ANONYMOUS_DISPLAY_NAME`] when both are missing or blank.
pub fn display_name(first_name: Option<&str>, last_name: Option<&str>) -> String {
    let joined = [first_name.unwrap_or(""), last_name.unwrap_or("")]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        ANONYMOUS_DISPLAY_NAME.to_string()
    } else {
        joined
    }
}

#[derive(Debug, Clone)]
pub struct ProfileCreateDBRequest {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub grade_level: GradeLevel,
    pub school_type: SchoolType,
    pub subjects: Option<String>,
    pub bio: Option<String>,
}

impl ProfileCreateDBRequest {
    /// The profile a user gets when they have never filled one in.
    pub fn defaults_for(user_id: UserId) -> Self {
        Self {
            user_id,
            first_name: String::new(),
            last_name: String::new(),
            grade_level: GradeLevel::High,
            school_type: SchoolType::Public,
            subjects: None,
            bio: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProfileUpdateDBRequest {
    pub first_name: String,
    pub last_name: String,
    pub grade_level: GradeLevel,
    pub school_type: SchoolType,
    pub subjects: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileDBResponse {
    pub id: Uuid,
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub grade_level: GradeLevel,
    pub school_type: SchoolType,
    pub subjects: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileDBResponse {
    pub fn display_name(&self) -> String {
        display_name(Some(&self.first_name), Some(&self.last_name))
    }
}
