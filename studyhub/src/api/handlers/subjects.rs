use axum::Json;

use crate::{
    api::models::subjects::VocabularyResponse,
    types::{DEFAULT_MEMBER_LIMIT, GradeLevel, MEMBER_LIMIT_OPTIONS, SUBJECTS, SchoolType},
};

/// List the fixed vocabularies
#[utoipa::path(
    get,
    path = "/subjects",
    tag = "subjects",
    summary = "List vocabularies",
    description = "Subjects, grade levels, school types and study group sizes accepted by the API. No authentication required.",
    responses(
        (status = 200, description = "Vocabularies", body = VocabularyResponse),
    )
)]
#[tracing::instrument]
pub async fn list_vocabularies() -> Json<VocabularyResponse> {
    Json(VocabularyResponse {
        subjects: SUBJECTS.iter().map(|s| s.to_string()).collect(),
        grade_levels: GradeLevel::ALL.to_vec(),
        school_types: SchoolType::ALL.to_vec(),
        member_limit_options: MEMBER_LIMIT_OPTIONS.to_vec(),
        default_member_limit: DEFAULT_MEMBER_LIMIT,
    })
}
