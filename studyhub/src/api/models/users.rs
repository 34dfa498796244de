//! API request/response models for users.

use crate::db::models::users::UserDBResponse;
use crate::types::{AppRole, UserId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The authenticated caller, resolved per request from the session token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub roles: Vec<AppRole>,
}

impl CurrentUser {
    /// Holds the platform-wide `admin` role
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&AppRole::Admin)
    }
}

impl From<&UserDBResponse> for CurrentUser {
    fn from(user: &UserDBResponse) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            roles: user.roles.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub roles: Vec<AppRole>,
    pub is_admin: bool,
    pub display_name: String,
}
