use crate::{
    db::{
        errors::Result,
        handlers::repository::Repository,
        models::messages::{MessageCreateDBRequest, MessageDBResponse},
    },
    types::{GroupId, MessageId, abbrev_uuid},
};
use sqlx::PgConnection;
use tracing::instrument;

pub struct Messages<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Messages<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Messages<'c> {
    type CreateRequest = MessageCreateDBRequest;
    type Response = MessageDBResponse;
    type Id = MessageId;
    /// Messages are only ever listed per group
    type Filter = GroupId;

    /// The insert fires `group_message_inserted`, which is how subscribers
    /// (including the sender) learn about the message.
    #[instrument(skip(self, request), fields(group_id = %abbrev_uuid(&request.group_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let message = sqlx::query_as::<_, MessageDBResponse>(
            "WITH inserted AS (
                INSERT INTO group_messages (group_id, user_id, content) VALUES ($1, $2, $3) RETURNING *
             )
             SELECT i.id, i.group_id, i.user_id, i.content, i.created_at, p.first_name, p.last_name
             FROM inserted i
             LEFT JOIN profiles p ON p.user_id = i.user_id",
        )
        .bind(request.group_id)
        .bind(request.user_id)
        .bind(&request.content)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(message)
    }

    #[instrument(skip(self), fields(message_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let message = sqlx::query_as::<_, MessageDBResponse>(
            "SELECT m.id, m.group_id, m.user_id, m.content, m.created_at, p.first_name, p.last_name
             FROM group_messages m
             LEFT JOIN profiles p ON p.user_id = m.user_id
             WHERE m.id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(message)
    }

    /// Oldest first; ties on `created_at` are broken by id.
    #[instrument(skip(self, group_id), fields(group_id = %abbrev_uuid(group_id)), err)]
    async fn list(&mut self, group_id: &Self::Filter) -> Result<Vec<Self::Response>> {
        let messages = sqlx::query_as::<_, MessageDBResponse>(
            "SELECT m.id, m.group_id, m.user_id, m.content, m.created_at, p.first_name, p.last_name
             FROM group_messages m
             LEFT JOIN profiles p ON p.user_id = m.user_id
             WHERE m.group_id = $1
             ORDER BY m.created_at ASC, m.id ASC",
        )
        .bind(group_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(messages)
    }
}
