use crate::{
    db::{
        errors::Result,
        handlers::repository::{Repository, like_pattern},
        models::groups::{GroupFilter, StudyGroupCreateDBRequest, StudyGroupDBResponse},
    },
    types::{GroupId, abbrev_uuid},
};
use sqlx::{PgConnection, QueryBuilder};
use tracing::instrument;

const SELECT_WITH_MEMBER_COUNT: &str = "SELECT g.*,
    (SELECT COUNT(*) FROM group_memberships m WHERE m.group_id = g.id) AS member_count
    FROM study_groups g";

pub struct StudyGroups<'c> {
    db: &'c mut PgConnection,
}

impl<'c> StudyGroups<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for StudyGroups<'c> {
    type CreateRequest = StudyGroupCreateDBRequest;
    type Response = StudyGroupDBResponse;
    type Id = GroupId;
    type Filter = GroupFilter;

    /// Inserts the group only. The creator's admin membership is added by the caller
    /// in the same transaction.
    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let group = sqlx::query_as::<_, StudyGroupDBResponse>(
            "INSERT INTO study_groups (name, description, subject, created_by, is_public, member_limit)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *, 0::BIGINT AS member_count",
        )
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.subject)
        .bind(request.created_by)
        .bind(request.is_public)
        .bind(request.member_limit)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(group)
    }

    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let sql = format!("{SELECT_WITH_MEMBER_COUNT} WHERE g.id = $1");
        let group = sqlx::query_as::<_, StudyGroupDBResponse>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(group)
    }

    /// Public groups only, newest first.
    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(SELECT_WITH_MEMBER_COUNT);
        query.push(" WHERE g.is_public = TRUE");

        if let Some(subject) = &filter.subject {
            query.push(" AND g.subject = ");
            query.push_bind(subject.clone());
        }

        if let Some(search) = &filter.search {
            let search_pattern = like_pattern(search);
            query.push(" AND (LOWER(g.name) LIKE ");
            query.push_bind(search_pattern.clone());
            query.push(" OR LOWER(COALESCE(g.description, '')) LIKE ");
            query.push_bind(search_pattern);
            query.push(")");
        }

        query.push(" ORDER BY g.created_at DESC, g.id");

        let groups = query.build_query_as::<StudyGroupDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(groups)
    }
}
