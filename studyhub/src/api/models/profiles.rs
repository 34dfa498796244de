//! API request/response models for profiles.

use crate::db::models::profiles::ProfileDBResponse;
use crate::types::{GradeLevel, SchoolType, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub grade_level: GradeLevel,
    pub school_type: SchoolType,
    /// Free-text list of favourite subjects
    pub subjects: Option<String>,
    pub bio: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProfileDBResponse> for ProfileResponse {
    fn from(db: ProfileDBResponse) -> Self {
        Self {
            display_name: db.display_name(),
            user_id: db.user_id,
            first_name: db.first_name,
            last_name: db.last_name,
            grade_level: db.grade_level,
            school_type: db.school_type,
            subjects: db.subjects,
            bio: db.bio,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub grade_level: GradeLevel,
    pub school_type: SchoolType,
    pub subjects: Option<String>,
    pub bio: Option<String>,
}
