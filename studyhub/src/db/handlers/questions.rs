use crate::{
    db::{
        errors::Result,
        handlers::repository::{Repository, like_pattern},
        models::questions::{QuestionCreateDBRequest, QuestionDBResponse, QuestionFilter},
    },
    types::{QuestionId, abbrev_uuid},
};
use sqlx::{PgConnection, QueryBuilder};
use tracing::instrument;

pub struct Questions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Questions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Questions<'c> {
    type CreateRequest = QuestionCreateDBRequest;
    type Response = QuestionDBResponse;
    type Id = QuestionId;
    type Filter = QuestionFilter;

    #[instrument(skip(self, request), fields(subject = %request.subject), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let question = sqlx::query_as::<_, QuestionDBResponse>(
            "INSERT INTO questions (user_id, title, content, subject, grade_level, tags)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(request.user_id)
        .bind(&request.title)
        .bind(&request.content)
        .bind(&request.subject)
        .bind(request.grade_level)
        .bind(&request.tags)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(question)
    }

    #[instrument(skip(self), fields(question_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let question = sqlx::query_as::<_, QuestionDBResponse>("SELECT * FROM questions WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(question)
    }

    /// Newest first. Search covers title, content and each tag; subject is exact.
    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM questions WHERE 1=1");

        if let Some(subject) = &filter.subject {
            query.push(" AND subject = ");
            query.push_bind(subject.clone());
        }

        if let Some(search) = &filter.search {
            let search_pattern = like_pattern(search);
            query.push(" AND (LOWER(title) LIKE ");
            query.push_bind(search_pattern.clone());
            query.push(" OR LOWER(content) LIKE ");
            query.push_bind(search_pattern.clone());
            query.push(" OR EXISTS (SELECT 1 FROM unnest(tags) AS tag WHERE LOWER(tag) LIKE ");
            query.push_bind(search_pattern);
            query.push("))");
        }

        query.push(" ORDER BY created_at DESC, id");

        let questions = query.build_query_as::<QuestionDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(questions)
    }
}
