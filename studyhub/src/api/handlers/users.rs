use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::users::{CurrentUser, CurrentUserResponse},
    db::models::profiles::display_name,
    errors::Result,
};

/// Build the caller's summary without creating a profile as a side effect.
pub(crate) async fn current_user_response(state: &AppState, user: &CurrentUser) -> Result<CurrentUserResponse> {
    let profile = state.store.get_profile(user.id).await?;
    Ok(CurrentUserResponse {
        id: user.id,
        email: user.email.clone(),
        roles: user.roles.clone(),
        is_admin: user.is_admin(),
        display_name: match profile {
            Some(profile) => profile.display_name(),
            None => display_name(None, None),
        },
    })
}

/// Get the current user
#[utoipa::path(
    get,
    path = "/users/current",
    tag = "users",
    summary = "Get current user",
    description = "The authenticated caller with their roles and display name",
    responses(
        (status = 200, description = "Current user", body = CurrentUserResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_current_user(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<CurrentUserResponse>> {
    Ok(Json(current_user_response(&state, &current_user).await?))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::users::CurrentUserResponse,
        test_utils::{bearer, create_test_server, seed_user},
        types::AppRole,
    };
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_current_user_requires_auth() {
        let (server, _state) = create_test_server();
        server.get("/api/v1/users/current").await.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_current_user_does_not_create_profile() {
        let (server, state) = create_test_server();
        let user = seed_user(&state, "admin@example.com", &[AppRole::User, AppRole::Admin]).await;

        let response = server
            .get("/api/v1/users/current")
            .add_header("authorization", bearer(&state, &user))
            .await;
        response.assert_status_ok();
        let body: CurrentUserResponse = response.json();
        assert_eq!(body.id, user.id);
        assert!(body.is_admin);
        assert_eq!(body.display_name, "Anonymous User");
        assert!(state.store.get_profile(user.id).await.unwrap().is_none());
    }
}
