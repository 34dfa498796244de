use crate::{
    db::{
        errors::Result,
        models::profiles::{ProfileCreateDBRequest, ProfileDBResponse, ProfileUpdateDBRequest},
    },
    types::{UserId, abbrev_uuid},
};
use sqlx::PgConnection;
use tracing::instrument;

pub struct Profiles<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Profiles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, user_id), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_by_user(&mut self, user_id: UserId) -> Result<Option<ProfileDBResponse>> {
        let profile = sqlx::query_as::<_, ProfileDBResponse>("SELECT * FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(profile)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    pub async fn create(&mut self, request: &ProfileCreateDBRequest) -> Result<ProfileDBResponse> {
        let profile = sqlx::query_as::<_, ProfileDBResponse>(
            "INSERT INTO profiles (user_id, first_name, last_name, grade_level, school_type, subjects, bio)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(request.user_id)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(request.grade_level)
        .bind(request.school_type)
        .bind(&request.subjects)
        .bind(&request.bio)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(profile)
    }

    /// Update the profile owned by `user_id`. Fails with `NotFound` when the user has none.
    #[instrument(skip(self, user_id, request), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn update(&mut self, user_id: UserId, request: &ProfileUpdateDBRequest) -> Result<ProfileDBResponse> {
        let profile = sqlx::query_as::<_, ProfileDBResponse>(
            "UPDATE profiles SET
                first_name = $2,
                last_name = $3,
                grade_level = $4,
                school_type = $5,
                subjects = $6,
                bio = $7,
                updated_at = NOW()
             WHERE user_id = $1
             RETURNING *",
        )
        .bind(user_id)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(request.grade_level)
        .bind(request.school_type)
        .bind(&request.subjects)
        .bind(&request.bio)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(profile)
    }
}
