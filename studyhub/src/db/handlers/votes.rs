use crate::{
    db::{
        errors::{DbError, Result},
        models::votes::VoteDBResponse,
    },
    types::{QuestionId, UserId, VoteTarget, VoteValue, abbrev_uuid},
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct Vote {
    id: Uuid,
    target_id: Uuid,
    user_id: UserId,
    vote_type: i16,
    created_at: DateTime<Utc>,
}

impl TryFrom<Vote> for VoteDBResponse {
    type Error = DbError;

    fn try_from(vote: Vote) -> Result<Self> {
        let value = VoteValue::try_from(vote.vote_type)
            .map_err(|raw| DbError::Other(anyhow::anyhow!("vote {} has invalid vote_type {raw}", vote.id)))?;
        Ok(VoteDBResponse {
            id: vote.id,
            target_id: vote.target_id,
            user_id: vote.user_id,
            value,
            created_at: vote.created_at,
        })
    }
}

/// Table and foreign key column holding votes for a target kind.
fn vote_table(target: &VoteTarget) -> (&'static str, &'static str) {
    match target {
        VoteTarget::Question(_) => ("question_votes", "question_id"),
        VoteTarget::Answer(_) => ("answer_votes", "answer_id"),
    }
}

/// Votes on questions and answers. The aggregate `votes` columns on the
/// target rows are maintained by triggers on these tables.
pub struct Votes<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Votes<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, target), fields(kind = target.kind(), target_id = %abbrev_uuid(&target.id())), err)]
    pub async fn find(&mut self, target: VoteTarget, user_id: UserId) -> Result<Option<VoteDBResponse>> {
        let (table, column) = vote_table(&target);
        let sql = format!(
            "SELECT id, {column} AS target_id, user_id, vote_type, created_at FROM {table} WHERE {column} = $1 AND user_id = $2"
        );
        let vote = sqlx::query_as::<_, Vote>(&sql)
            .bind(target.id())
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;
        vote.map(VoteDBResponse::try_from).transpose()
    }

    #[instrument(skip(self, target), fields(kind = target.kind(), target_id = %abbrev_uuid(&target.id())), err)]
    pub async fn insert(&mut self, target: VoteTarget, user_id: UserId, value: VoteValue) -> Result<VoteDBResponse> {
        let (table, column) = vote_table(&target);
        let sql = format!(
            "INSERT INTO {table} ({column}, user_id, vote_type) VALUES ($1, $2, $3)
             RETURNING id, {column} AS target_id, user_id, vote_type, created_at"
        );
        let vote = sqlx::query_as::<_, Vote>(&sql)
            .bind(target.id())
            .bind(user_id)
            .bind(value.as_i16())
            .fetch_one(&mut *self.db)
            .await?;
        vote.try_into()
    }

    #[instrument(skip(self, target, vote_id), fields(kind = target.kind(), vote_id = %abbrev_uuid(&vote_id)), err)]
    pub async fn update(&mut self, target: VoteTarget, vote_id: Uuid, value: VoteValue) -> Result<VoteDBResponse> {
        let (table, column) = vote_table(&target);
        let sql = format!(
            "UPDATE {table} SET vote_type = $2 WHERE id = $1
             RETURNING id, {column} AS target_id, user_id, vote_type, created_at"
        );
        let vote = sqlx::query_as::<_, Vote>(&sql)
            .bind(vote_id)
            .bind(value.as_i16())
            .fetch_one(&mut *self.db)
            .await?;
        vote.try_into()
    }

    /// Returns whether a row was removed.
    #[instrument(skip(self, target, vote_id), fields(kind = target.kind(), vote_id = %abbrev_uuid(&vote_id)), err)]
    pub async fn delete(&mut self, target: VoteTarget, vote_id: Uuid) -> Result<bool> {
        let (table, _) = vote_table(&target);
        let sql = format!("DELETE FROM {table} WHERE id = $1");
        let result = sqlx::query(&sql).bind(vote_id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    /// The user's votes on every answer of one question.
    #[instrument(skip(self, question_id), fields(question_id = %abbrev_uuid(&question_id)), err)]
    pub async fn list_for_answers(&mut self, question_id: QuestionId, user_id: UserId) -> Result<Vec<VoteDBResponse>> {
        let votes = sqlx::query_as::<_, Vote>(
            "SELECT av.id, av.answer_id AS target_id, av.user_id, av.vote_type, av.created_at
             FROM answer_votes av
             JOIN answers a ON a.id = av.answer_id
             WHERE a.question_id = $1 AND av.user_id = $2",
        )
        .bind(question_id)
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;
        votes.into_iter().map(VoteDBResponse::try_from).collect()
    }
}
