use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::{
        profiles::{ProfileResponse, ProfileUpdate},
        users::CurrentUser,
    },
    errors::Result,
    services::profiles,
};

/// Get the caller's profile, creating a default one on first read
#[utoipa::path(
    get,
    path = "/profile",
    tag = "profile",
    summary = "Get own profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_profile(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ProfileResponse>> {
    let profile = profiles::get_or_create(state.store.as_ref(), current_user.id).await?;
    Ok(Json(profile.into()))
}

/// Replace the caller's profile
#[utoipa::path(
    put,
    path = "/profile",
    tag = "profile",
    summary = "Update own profile",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "First or last name missing"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>> {
    let profile = profiles::update(state.store.as_ref(), current_user.id, update).await?;
    Ok(Json(profile.into()))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::profiles::ProfileResponse,
        test_utils::{bearer, create_test_server, seed_user},
        types::{AppRole, GradeLevel, SchoolType},
    };
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_profile_round_trip() {
        let (server, state) = create_test_server();
        let user = seed_user(&state, "student@example.com", &[AppRole::User]).await;
        let auth = bearer(&state, &user);

        let response = server.get("/api/v1/profile").add_header("authorization", auth.clone()).await;
        response.assert_status_ok();
        let profile: ProfileResponse = response.json();
        assert_eq!(profile.display_name, "Anonymous User");
        assert_eq!(profile.grade_level, GradeLevel::High);

        let response = server
            .put("/api/v1/profile")
            .add_header("authorization", auth.clone())
            .json(&json!({
                "first_name": "Grace",
                "last_name": "Hopper",
                "grade_level": "graduate",
                "school_type": "online",
                "subjects": "Math, Computer Science",
                "bio": "  "
            }))
            .await;
        response.assert_status_ok();
        let profile: ProfileResponse = response.json();
        assert_eq!(profile.display_name, "Grace Hopper");
        assert_eq!(profile.school_type, SchoolType::Online);
        assert_eq!(profile.bio, None);

        let response = server
            .put("/api/v1/profile")
            .add_header("authorization", auth)
            .json(&json!({
                "first_name": "",
                "last_name": "Hopper",
                "grade_level": "graduate",
                "school_type": "online"
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }
}
