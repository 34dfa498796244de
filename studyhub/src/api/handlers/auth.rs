use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    api::{
        handlers::users::current_user_response,
        models::{
            auth::{AuthResponse, AuthSuccessResponse, LoginRequest, LogoutResponse, LogoutSuccessResponse, RegisterRequest},
            users::CurrentUser,
        },
    },
    auth::{password, session},
    db::models::{profiles::ProfileCreateDBRequest, users::UserCreateDBRequest},
    errors::Error,
    types::{AppRole, abbrev_uuid},
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Trim and lowercase an email address, rejecting obviously malformed ones.
fn normalize_email(email: &str) -> Result<String, Error> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.contains('@') && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(Error::bad_request("Please enter a valid email address"));
    }
    Ok(email)
}

fn session_response(user: &CurrentUser, state: &AppState, status: StatusCode, body: AuthResponse) -> Result<AuthSuccessResponse, Error> {
    let token = session::create_session_token(user, &state.config)?;
    Ok(AuthSuccessResponse {
        status,
        body,
        cookie: session::session_cookie(&token, &state.config),
    })
}

/// Register a new user account
#[utoipa::path(
    post,
    path = "/authentication/register",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid email or password"),
        (status = 409, description = "User already exists"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<AuthSuccessResponse, Error> {
    let email = normalize_email(&request.email)?;
    password::validate_length(&request.password, &state.config.auth.password)?;

    if state.store.get_user_by_email(&email).await?.is_some() {
        return Err(Error::conflict("An account with this email address already exists"));
    }

    let password_hash = password::hash_in_background(request.password).await?;
    let created_user = state
        .store
        .create_user(&UserCreateDBRequest {
            email,
            password_hash,
            roles: vec![AppRole::User],
        })
        .await?;

    let first_name = request.first_name.map(|n| n.trim().to_string()).unwrap_or_default();
    let last_name = request.last_name.map(|n| n.trim().to_string()).unwrap_or_default();
    if !first_name.is_empty() || !last_name.is_empty() {
        let mut profile = ProfileCreateDBRequest::defaults_for(created_user.id);
        profile.first_name = first_name;
        profile.last_name = last_name;
        if let Some(grade_level) = request.grade_level {
            profile.grade_level = grade_level;
        }
        if let Some(school_type) = request.school_type {
            profile.school_type = school_type;
        }
        state.store.create_profile(&profile).await?;
    }
    tracing::info!("Registered user {}", abbrev_uuid(&created_user.id));

    let current_user = CurrentUser::from(&created_user);
    let body = AuthResponse {
        user: current_user_response(&state, &current_user).await?,
        message: "Registration successful".to_string(),
    };
    session_response(&current_user, &state, StatusCode::CREATED, body)
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/authentication/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<AuthSuccessResponse, Error> {
    let invalid = || Error::Unauthenticated {
        message: Some(INVALID_CREDENTIALS.to_string()),
    };

    let email = request.email.trim().to_lowercase();
    let user = state.store.get_user_by_email(&email).await?.ok_or_else(invalid)?;

    if !password::verify_in_background(request.password, user.password_hash.clone()).await? {
        return Err(invalid());
    }
    state.store.record_login(user.id).await?;

    let current_user = CurrentUser::from(&user);
    let body = AuthResponse {
        user: current_user_response(&state, &current_user).await?,
        message: "Login successful".to_string(),
    };
    session_response(&current_user, &state, StatusCode::OK, body)
}

/// Log out by clearing the session cookie
#[utoipa::path(
    post,
    path = "/authentication/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful", body = LogoutResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Result<LogoutSuccessResponse, Error> {
    Ok(LogoutSuccessResponse {
        body: LogoutResponse {
            message: "Logout successful".to_string(),
        },
        cookie: session::expired_session_cookie(&state.config),
    })
}
