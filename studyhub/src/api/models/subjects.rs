//! Static vocabularies exposed to clients for building forms and filters.

use crate::types::{GradeLevel, SchoolType};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VocabularyResponse {
    pub subjects: Vec<String>,
    pub grade_levels: Vec<GradeLevel>,
    pub school_types: Vec<SchoolType>,
    pub member_limit_options: Vec<i32>,
    pub default_member_limit: i32,
}
