//! The narrow data-access interface used by the services and API handlers.
//!
//! [`Store`] is the single seam between request handling and persistence.
//! Check-then-act sequences (vote toggling, the advisory capacity check) are
//! composed from its primitives in [`crate::services`], so replacing one of
//! them with an atomic server-side operation only touches an implementation
//! of this trait.
//!
//! Two implementations exist:
//!
//! - [`postgres::PgStore`]: the production store, built from the repositories in
//!   [`crate::db::handlers`]. Multi-step writes run in one transaction.
//! - [`in_memory::InMemoryStore`]: a process-local store for tests and demos.
//!   Aggregates and message notifications are emulated in code.

use std::sync::Arc;

use crate::db::{
    errors::Result,
    models::{
        groups::{GroupFilter, MemberDBResponse, MembershipDBResponse, StudyGroupCreateDBRequest, StudyGroupDBResponse},
        join_requests::{JoinRequestCreateDBRequest, JoinRequestDBResponse, JoinRequestDecision},
        messages::{MessageCreateDBRequest, MessageDBResponse},
        profiles::{ProfileCreateDBRequest, ProfileDBResponse, ProfileUpdateDBRequest},
        questions::{AnswerCreateDBRequest, AnswerDBResponse, QuestionCreateDBRequest, QuestionDBResponse, QuestionFilter},
        users::{UserCreateDBRequest, UserDBResponse},
        votes::VoteDBResponse,
    },
};
use crate::types::{
    AnswerId, AppRole, GroupId, JoinRequestId, JoinRequestStatus, MembershipRole, MessageId, QuestionId, UserId, VoteTarget,
    VoteValue,
};
use uuid::Uuid;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PgStore;

/// Shared handle to whichever store the application was started with.
pub type SharedStore = Arc<dyn Store>;

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // Users and roles

    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse>;
    async fn get_user(&self, id: UserId) -> Result<Option<UserDBResponse>>;
    /// Case-insensitive email lookup
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>>;
    async fn grant_role(&self, user_id: UserId, role: AppRole) -> Result<()>;
    async fn set_password(&self, user_id: UserId, password_hash: &str) -> Result<()>;
    async fn record_login(&self, user_id: UserId) -> Result<()>;

    // Profiles

    async fn get_profile(&self, user_id: UserId) -> Result<Option<ProfileDBResponse>>;
    async fn create_profile(&self, request: &ProfileCreateDBRequest) -> Result<ProfileDBResponse>;
    async fn update_profile(&self, user_id: UserId, request: &ProfileUpdateDBRequest) -> Result<ProfileDBResponse>;

    // Questions and answers

    async fn create_question(&self, request: &QuestionCreateDBRequest) -> Result<QuestionDBResponse>;
    async fn get_question(&self, id: QuestionId) -> Result<Option<QuestionDBResponse>>;
    /// Newest first
    async fn list_questions(&self, filter: &QuestionFilter) -> Result<Vec<QuestionDBResponse>>;
    async fn create_answer(&self, request: &AnswerCreateDBRequest) -> Result<AnswerDBResponse>;
    async fn get_answer(&self, id: AnswerId) -> Result<Option<AnswerDBResponse>>;
    /// Highest voted first
    async fn list_answers(&self, question_id: QuestionId) -> Result<Vec<AnswerDBResponse>>;

    // Votes

    async fn find_vote(&self, target: VoteTarget, user_id: UserId) -> Result<Option<VoteDBResponse>>;
    async fn insert_vote(&self, target: VoteTarget, user_id: UserId, value: VoteValue) -> Result<VoteDBResponse>;
    async fn update_vote(&self, target: VoteTarget, vote_id: Uuid, value: VoteValue) -> Result<VoteDBResponse>;
    async fn delete_vote(&self, target: VoteTarget, vote_id: Uuid) -> Result<bool>;
    async fn list_answer_votes(&self, question_id: QuestionId, user_id: UserId) -> Result<Vec<VoteDBResponse>>;

    // Study groups and memberships

    /// Create a group and make its creator an `admin` member, atomically.
    async fn create_group_with_admin(&self, request: &StudyGroupCreateDBRequest) -> Result<StudyGroupDBResponse>;
    async fn get_group(&self, id: GroupId) -> Result<Option<StudyGroupDBResponse>>;
    /// Public groups only, newest first
    async fn list_groups(&self, filter: &GroupFilter) -> Result<Vec<StudyGroupDBResponse>>;
    async fn get_membership(&self, group_id: GroupId, user_id: UserId) -> Result<Option<MembershipDBResponse>>;
    async fn add_membership(&self, group_id: GroupId, user_id: UserId, role: MembershipRole) -> Result<MembershipDBResponse>;
    async fn list_members(&self, group_id: GroupId) -> Result<Vec<MemberDBResponse>>;
    async fn list_user_memberships(&self, user_id: UserId) -> Result<Vec<MembershipDBResponse>>;

    // Join requests

    async fn create_join_request(&self, request: &JoinRequestCreateDBRequest) -> Result<JoinRequestDBResponse>;
    async fn get_join_request(&self, id: JoinRequestId) -> Result<Option<JoinRequestDBResponse>>;
    async fn find_pending_join_request(&self, group_id: GroupId, user_id: UserId) -> Result<Option<JoinRequestDBResponse>>;
    async fn list_join_requests(&self, group_id: GroupId, status: Option<JoinRequestStatus>) -> Result<Vec<JoinRequestDBResponse>>;
    /// Apply a terminal decision to a pending request. Approval also inserts a
    /// `member` membership (a no-op if one exists) in the same unit of work.
    /// Returns `None` when the request is missing or no longer pending.
    async fn review_join_request(
        &self,
        id: JoinRequestId,
        reviewer: UserId,
        decision: JoinRequestDecision,
    ) -> Result<Option<JoinRequestDBResponse>>;

    // Group chat

    /// Insert a message. Subscribers are told through the realtime channel.
    async fn create_message(&self, request: &MessageCreateDBRequest) -> Result<MessageDBResponse>;
    /// Fetch one message with its author's names
    async fn get_message(&self, id: MessageId) -> Result<Option<MessageDBResponse>>;
    /// Oldest first
    async fn list_messages(&self, group_id: GroupId) -> Result<Vec<MessageDBResponse>>;
}
