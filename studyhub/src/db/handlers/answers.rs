use crate::{
    db::{
        errors::Result,
        handlers::repository::Repository,
        models::questions::{AnswerCreateDBRequest, AnswerDBResponse},
    },
    types::{AnswerId, QuestionId, abbrev_uuid},
};
use sqlx::PgConnection;
use tracing::instrument;

pub struct Answers<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Answers<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Answers<'c> {
    type CreateRequest = AnswerCreateDBRequest;
    type Response = AnswerDBResponse;
    type Id = AnswerId;
    /// Answers are only ever listed per question
    type Filter = QuestionId;

    #[instrument(skip(self, request), fields(question_id = %abbrev_uuid(&request.question_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let answer = sqlx::query_as::<_, AnswerDBResponse>(
            "INSERT INTO answers (question_id, user_id, content) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(request.question_id)
        .bind(request.user_id)
        .bind(&request.content)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(answer)
    }

    #[instrument(skip(self), fields(answer_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let answer = sqlx::query_as::<_, AnswerDBResponse>("SELECT * FROM answers WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(answer)
    }

    /// Highest voted first, oldest first among ties.
    #[instrument(skip(self, question_id), fields(question_id = %abbrev_uuid(question_id)), err)]
    async fn list(&mut self, question_id: &Self::Filter) -> Result<Vec<Self::Response>> {
        let answers = sqlx::query_as::<_, AnswerDBResponse>(
            "SELECT * FROM answers WHERE question_id = $1 ORDER BY votes DESC, created_at ASC, id",
        )
        .bind(question_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(answers)
    }
}
