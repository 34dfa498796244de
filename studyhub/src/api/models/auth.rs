//! API request/response models for authentication.

use super::users::CurrentUserResponse;
use crate::types::{GradeLevel, SchoolType};
use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub grade_level: Option<GradeLevel>,
    pub school_type: Option<SchoolType>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: CurrentUserResponse,
    pub message: String,
}

/// An auth response that also sets (or clears) the session cookie.
pub struct AuthSuccessResponse {
    pub status: StatusCode,
    pub body: AuthResponse,
    pub cookie: String,
}

impl IntoResponse for AuthSuccessResponse {
    fn into_response(self) -> Response {
        (self.status, [(header::SET_COOKIE, self.cookie)], Json(self.body)).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {
    pub message: String,
}

pub struct LogoutSuccessResponse {
    pub body: LogoutResponse,
    pub cookie: String,
}

impl IntoResponse for LogoutSuccessResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, [(header::SET_COOKIE, self.cookie)], Json(self.body)).into_response()
    }
}
