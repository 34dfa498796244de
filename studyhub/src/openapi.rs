//! OpenAPI documentation for the HTTP API.
//!
//! [`ApiDoc`] covers the authentication routes and nests [`V1ApiDoc`] under
//! `/api/v1`. Both session transports are declared as security schemes.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.security_schemes.insert(
            "BearerAuth".to_string(),
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some(
                        "Session token returned by login or registration:\n\n```\nAuthorization: Bearer YOUR_TOKEN\n```",
                    ))
                    .build(),
            ),
        );
        components.security_schemes.insert(
            "CookieAuth".to_string(),
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "studyhub_session",
                "Session cookie set by login or registration",
            ))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::users::get_current_user,
        api::handlers::profiles::get_profile,
        api::handlers::profiles::update_profile,
        api::handlers::subjects::list_vocabularies,
        api::handlers::questions::list_questions,
        api::handlers::questions::create_question,
        api::handlers::questions::get_question,
        api::handlers::questions::create_answer,
        api::handlers::questions::vote_question,
        api::handlers::questions::vote_answer,
        api::handlers::groups::list_groups,
        api::handlers::groups::create_group,
        api::handlers::groups::get_group,
        api::handlers::groups::list_members,
        api::handlers::groups::join_group,
        api::handlers::groups::create_join_request,
        api::handlers::groups::list_join_requests,
        api::handlers::groups::review_join_request,
        api::handlers::messages::list_messages,
        api::handlers::messages::create_message,
        api::handlers::messages::stream_messages,
    ),
    components(schemas(
        api::models::users::CurrentUserResponse,
        api::models::profiles::ProfileResponse,
        api::models::profiles::ProfileUpdate,
        api::models::subjects::VocabularyResponse,
        api::models::questions::QuestionCreate,
        api::models::questions::QuestionResponse,
        api::models::questions::QuestionDetailResponse,
        api::models::questions::AnswerCreate,
        api::models::questions::AnswerResponse,
        api::models::questions::VoteRequest,
        api::models::questions::VoteResponse,
        api::models::groups::GroupCreate,
        api::models::groups::GroupResponse,
        api::models::groups::GroupDetailResponse,
        api::models::groups::GroupAccessResponse,
        api::models::groups::MemberResponse,
        api::models::groups::MembershipResponse,
        api::models::groups::JoinRequestCreate,
        api::models::groups::JoinRequestResponse,
        api::models::groups::JoinRequestReview,
        api::models::messages::MessageCreate,
        api::models::messages::MessageResponse,
    )),
    tags(
        (name = "users", description = "The authenticated caller"),
        (name = "profile", description = "The caller's profile"),
        (name = "subjects", description = "Fixed vocabularies"),
        (name = "questions", description = "Questions, answers and votes"),
        (name = "groups", description = "Study groups, memberships and join requests"),
        (name = "messages", description = "Group chat"),
    )
)]
pub struct V1ApiDoc;

#[derive(OpenApi)]
#[openapi(
    info(title = "StudyHub API", description = "Questions and answers, study groups and group chat for students."),
    modifiers(&SecurityAddon),
    nest((path = "/api/v1", api = V1ApiDoc)),
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::logout,
    ),
    components(schemas(
        api::models::auth::RegisterRequest,
        api::models::auth::LoginRequest,
        api::models::auth::AuthResponse,
        api::models::auth::LogoutResponse,
    )),
    tags((name = "authentication", description = "Sessions and registration"))
)]
pub struct ApiDoc;
