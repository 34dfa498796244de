use crate::{
    db::{
        errors::Result,
        models::groups::{MemberDBResponse, MembershipDBResponse},
    },
    types::{GroupId, MembershipRole, UserId, abbrev_uuid},
};
use sqlx::PgConnection;
use tracing::instrument;

pub struct Memberships<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Memberships<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert a membership. A duplicate surfaces as a unique violation.
    #[instrument(skip(self, group_id, user_id), fields(group_id = %abbrev_uuid(&group_id), user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn add(&mut self, group_id: GroupId, user_id: UserId, role: MembershipRole) -> Result<MembershipDBResponse> {
        let membership = sqlx::query_as::<_, MembershipDBResponse>(
            "INSERT INTO group_memberships (group_id, user_id, role) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(group_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(membership)
    }

    /// Insert a membership unless one already exists. Returns `None` when it did.
    #[instrument(skip(self, group_id, user_id), fields(group_id = %abbrev_uuid(&group_id), user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn add_if_absent(
        &mut self,
        group_id: GroupId,
        user_id: UserId,
        role: MembershipRole,
    ) -> Result<Option<MembershipDBResponse>> {
        let membership = sqlx::query_as::<_, MembershipDBResponse>(
            "INSERT INTO group_memberships (group_id, user_id, role) VALUES ($1, $2, $3)
             ON CONFLICT (group_id, user_id) DO NOTHING
             RETURNING *",
        )
        .bind(group_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(membership)
    }

    #[instrument(skip(self, group_id, user_id), fields(group_id = %abbrev_uuid(&group_id), user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get(&mut self, group_id: GroupId, user_id: UserId) -> Result<Option<MembershipDBResponse>> {
        let membership =
            sqlx::query_as::<_, MembershipDBResponse>("SELECT * FROM group_memberships WHERE group_id = $1 AND user_id = $2")
                .bind(group_id)
                .bind(user_id)
                .fetch_optional(&mut *self.db)
                .await?;
        Ok(membership)
    }

    /// Members with their profile names, earliest joiner first.
    #[instrument(skip(self, group_id), fields(group_id = %abbrev_uuid(&group_id)), err)]
    pub async fn list_members(&mut self, group_id: GroupId) -> Result<Vec<MemberDBResponse>> {
        let members = sqlx::query_as::<_, MemberDBResponse>(
            "SELECT m.user_id, m.role, m.joined_at, p.first_name, p.last_name
             FROM group_memberships m
             LEFT JOIN profiles p ON p.user_id = m.user_id
             WHERE m.group_id = $1
             ORDER BY m.joined_at ASC, m.id",
        )
        .bind(group_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(members)
    }

    #[instrument(skip(self, user_id), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn list_for_user(&mut self, user_id: UserId) -> Result<Vec<MembershipDBResponse>> {
        let memberships = sqlx::query_as::<_, MembershipDBResponse>("SELECT * FROM group_memberships WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(memberships)
    }
}
