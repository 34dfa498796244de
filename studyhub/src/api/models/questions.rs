//! API request/response models for questions, answers and votes.

use std::collections::HashMap;

use crate::db::models::questions::{AnswerDBResponse, QuestionDBResponse};
use crate::services::voting::VoteOutcome;
use crate::types::{AnswerId, GradeLevel, QuestionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct QuestionCreate {
    pub title: String,
    pub content: String,
    pub subject: String,
    pub grade_level: GradeLevel,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: QuestionId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub title: String,
    pub content: String,
    pub subject: String,
    pub grade_level: GradeLevel,
    pub tags: Vec<String>,
    pub votes: i32,
    pub answer_count: i32,
    pub created_at: DateTime<Utc>,
}

impl From<QuestionDBResponse> for QuestionResponse {
    fn from(db: QuestionDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            title: db.title,
            content: db.content,
            subject: db.subject,
            grade_level: db.grade_level,
            tags: db.tags,
            votes: db.votes,
            answer_count: db.answer_count,
            created_at: db.created_at,
        }
    }
}

/// Query parameters for listing questions
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListQuestionsQuery {
    /// Case-insensitive substring match over title, content and tags
    pub search: Option<String>,
    /// Exact subject match; `all` disables the filter
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AnswerCreate {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AnswerId,
    #[schema(value_type = String, format = "uuid")]
    pub question_id: QuestionId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub content: String,
    pub votes: i32,
    pub created_at: DateTime<Utc>,
}

impl From<AnswerDBResponse> for AnswerResponse {
    fn from(db: AnswerDBResponse) -> Self {
        Self {
            id: db.id,
            question_id: db.question_id,
            user_id: db.user_id,
            content: db.content,
            votes: db.votes,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionDetailResponse {
    pub question: QuestionResponse,
    /// Highest voted first
    pub answers: Vec<AnswerResponse>,
    /// The caller's vote on the question (1 or -1), if any
    pub my_vote: Option<i16>,
    /// The caller's votes on answers, keyed by answer id
    #[schema(value_type = HashMap<String, i16>)]
    pub my_answer_votes: HashMap<AnswerId, i16>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VoteRequest {
    /// 1 for an up vote, -1 for a down vote. Kept loose so any other value is a 400.
    #[serde(default)]
    #[schema(value_type = i16)]
    pub vote_type: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VoteResponse {
    pub outcome: VoteOutcome,
    /// The caller's vote after this cast
    pub my_vote: Option<i16>,
    /// The target's vote total after this cast
    pub votes: i32,
}
