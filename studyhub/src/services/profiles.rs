//! Profile rules. A profile is created lazily with defaults the first time it
//! is read, and an update must name the user.

use tracing::{debug, instrument};

use crate::api::models::profiles::ProfileUpdate;
use crate::db::errors::DbError;
use crate::db::models::profiles::{ProfileCreateDBRequest, ProfileDBResponse, ProfileUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::store::Store;
use crate::types::{UserId, abbrev_uuid};

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Return the user's profile, creating the default one if it does not exist.
#[instrument(skip(store, user_id), fields(user_id = %abbrev_uuid(&user_id)), err)]
pub async fn get_or_create(store: &dyn Store, user_id: UserId) -> Result<ProfileDBResponse> {
    if let Some(profile) = store.get_profile(user_id).await? {
        return Ok(profile);
    }
    debug!("No profile yet, creating defaults");
    match store.create_profile(&ProfileCreateDBRequest::defaults_for(user_id)).await {
        Ok(profile) => Ok(profile),
        // Lost a race with a concurrent first read
        Err(DbError::UniqueViolation { .. }) => store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| Error::not_found("Profile", user_id)),
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip(store, user_id, update), fields(user_id = %abbrev_uuid(&user_id)), err)]
pub async fn update(store: &dyn Store, user_id: UserId, update: ProfileUpdate) -> Result<ProfileDBResponse> {
    let first_name = update.first_name.trim().to_string();
    let last_name = update.last_name.trim().to_string();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(Error::bad_request("First and last name are required"));
    }

    get_or_create(store, user_id).await?;
    Ok(store
        .update_profile(
            user_id,
            &ProfileUpdateDBRequest {
                first_name,
                last_name,
                grade_level: update.grade_level,
                school_type: update.school_type,
                subjects: blank_to_none(update.subjects),
                bio: blank_to_none(update.bio),
            },
        )
        .await?)
}
