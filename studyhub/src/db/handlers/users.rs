use crate::{
    db::{
        errors::Result,
        models::users::{UserCreateDBRequest, UserDBResponse},
    },
    types::{AppRole, UserId, abbrev_uuid},
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct User {
    id: UserId,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}

impl User {
    fn into_response(self, roles: Vec<AppRole>) -> UserDBResponse {
        UserDBResponse {
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
            roles,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_login: self.last_login,
        }
    }
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert a user and their app roles. Call inside a transaction.
    #[instrument(skip(self, request), fields(email = %request.email), err)]
    pub async fn create(&mut self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (email, password_hash) VALUES ($1, $2)
             RETURNING id, email, password_hash, created_at, updated_at, last_login",
        )
        .bind(&request.email)
        .bind(&request.password_hash)
        .fetch_one(&mut *self.db)
        .await?;

        for role in &request.roles {
            self.grant_role(user.id, *role).await?;
        }

        let roles = self.roles(user.id).await?;
        Ok(user.into_response(roles))
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: UserId) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at, updated_at, last_login FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        match user {
            Some(user) => {
                let roles = self.roles(user.id).await?;
                Ok(Some(user.into_response(roles)))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at, updated_at, last_login FROM users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&mut *self.db)
        .await?;

        match user {
            Some(user) => {
                let roles = self.roles(user.id).await?;
                Ok(Some(user.into_response(roles)))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, user_id), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn roles(&mut self, user_id: UserId) -> Result<Vec<AppRole>> {
        let roles = sqlx::query_scalar::<_, AppRole>("SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role")
            .bind(user_id)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(roles)
    }

    /// Idempotent: granting a role the user already has is a no-op.
    #[instrument(skip(self, user_id), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn grant_role(&mut self, user_id: UserId, role: AppRole) -> Result<()> {
        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2) ON CONFLICT (user_id, role) DO NOTHING")
            .bind(user_id)
            .bind(role)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, user_id, password_hash), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn set_password(&mut self, user_id: UserId, password_hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&mut *self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(crate::db::errors::DbError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self, user_id), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn record_login(&mut self, user_id: UserId) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }
}
