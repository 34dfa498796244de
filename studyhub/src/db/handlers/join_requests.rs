use crate::{
    db::{
        errors::Result,
        handlers::repository::Repository,
        models::join_requests::{JoinRequestCreateDBRequest, JoinRequestDBResponse},
    },
    types::{GroupId, JoinRequestId, JoinRequestStatus, UserId, abbrev_uuid},
};
use sqlx::{PgConnection, QueryBuilder};
use tracing::instrument;

const SELECT_WITH_NAMES: &str = "SELECT r.id, r.group_id, r.user_id, r.message, r.status, r.requested_at,
    r.reviewed_at, r.reviewed_by, p.first_name, p.last_name
    FROM join_requests r
    LEFT JOIN profiles p ON p.user_id = r.user_id";

/// Filter for listing join requests of one group.
#[derive(Debug, Clone)]
pub struct JoinRequestFilter {
    pub group_id: GroupId,
    pub status: Option<JoinRequestStatus>,
}

pub struct JoinRequests<'c> {
    db: &'c mut PgConnection,
}

impl<'c> JoinRequests<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, group_id, user_id), fields(group_id = %abbrev_uuid(&group_id), user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn find_pending(&mut self, group_id: GroupId, user_id: UserId) -> Result<Option<JoinRequestDBResponse>> {
        let sql = format!("{SELECT_WITH_NAMES} WHERE r.group_id = $1 AND r.user_id = $2 AND r.status = 'pending'");
        let request = sqlx::query_as::<_, JoinRequestDBResponse>(&sql)
            .bind(group_id)
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(request)
    }

    /// Move a pending request to a terminal status. Returns `None` if the request
    /// does not exist or was no longer pending.
    #[instrument(skip(self, id, reviewer, status), fields(request_id = %abbrev_uuid(&id), status = ?status), err)]
    pub async fn review(
        &mut self,
        id: JoinRequestId,
        reviewer: UserId,
        status: JoinRequestStatus,
    ) -> Result<Option<JoinRequestDBResponse>> {
        let request = sqlx::query_as::<_, JoinRequestDBResponse>(
            "WITH reviewed AS (
                UPDATE join_requests
                SET status = $2, reviewed_at = NOW(), reviewed_by = $3
                WHERE id = $1 AND status = 'pending'
                RETURNING *
             )
             SELECT r.id, r.group_id, r.user_id, r.message, r.status, r.requested_at,
                    r.reviewed_at, r.reviewed_by, p.first_name, p.last_name
             FROM reviewed r
             LEFT JOIN profiles p ON p.user_id = r.user_id",
        )
        .bind(id)
        .bind(status)
        .bind(reviewer)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(request)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for JoinRequests<'c> {
    type CreateRequest = JoinRequestCreateDBRequest;
    type Response = JoinRequestDBResponse;
    type Id = JoinRequestId;
    type Filter = JoinRequestFilter;

    /// A second pending request for the same user and group violates
    /// `idx_join_requests_one_pending`.
    #[instrument(skip(self, request), fields(group_id = %abbrev_uuid(&request.group_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let created = sqlx::query_as::<_, JoinRequestDBResponse>(
            "WITH inserted AS (
                INSERT INTO join_requests (group_id, user_id, message) VALUES ($1, $2, $3) RETURNING *
             )
             SELECT r.id, r.group_id, r.user_id, r.message, r.status, r.requested_at,
                    r.reviewed_at, r.reviewed_by, p.first_name, p.last_name
             FROM inserted r
             LEFT JOIN profiles p ON p.user_id = r.user_id",
        )
        .bind(request.group_id)
        .bind(request.user_id)
        .bind(&request.message)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(created)
    }

    #[instrument(skip(self), fields(request_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let sql = format!("{SELECT_WITH_NAMES} WHERE r.id = $1");
        let request = sqlx::query_as::<_, JoinRequestDBResponse>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(request)
    }

    /// Oldest request first.
    #[instrument(skip(self, filter), fields(group_id = %abbrev_uuid(&filter.group_id)), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(SELECT_WITH_NAMES);
        query.push(" WHERE r.group_id = ");
        query.push_bind(filter.group_id);

        if let Some(status) = filter.status {
            query.push(" AND r.status = ");
            query.push_bind(status);
        }

        query.push(" ORDER BY r.requested_at ASC, r.id");

        let requests = query.build_query_as::<JoinRequestDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(requests)
    }
}
