//! Shared constructors for unit and handler tests.

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session::create_session_token,
    config::{Config, DatabaseConfig},
    db::{
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
    },
    store::{InMemoryStore, Store},
    types::{
        AnswerId, AppRole, GroupId, JoinRequestId, JoinRequestStatus, MembershipRole, MessageId, QuestionId, UserId, VoteTarget,
        VoteValue,
    },
};
use axum_test::TestServer;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::yield_now;
use uuid::Uuid;

pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig::Memory,
        admin_email: "admin@test.com".to_string(),
        admin_password: None,
        secret_key: Some("test-secret-key-for-testing-only-0123456789".to_string()),
        enable_metrics: false,
        ..Default::default()
    };
    config.auth.session.cookie_secure = false;
    config
}

/// App state over a fresh in-memory store.
pub fn create_test_state() -> AppState {
    let config = create_test_config();
    let (message_events, _) = broadcast::channel(config.realtime.channel_capacity);
    AppState::builder()
        .store(Arc::new(InMemoryStore::new(message_events.clone())))
        .message_events(message_events)
        .config(config)
        .build()
}

/// The full router over a fresh in-memory store, plus the state behind it.
pub fn create_test_server() -> (TestServer, AppState) {
    let state = create_test_state();
    let router = crate::build_router(&state).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to create test server");
    (server, state)
}

/// Insert a user directly. The password hash is a placeholder, so these users cannot log in.
pub async fn seed_user(state: &AppState, email: &str, roles: &[AppRole]) -> UserDBResponse {
    state
        .store
        .create_user(&UserCreateDBRequest {
            email: email.to_string(),
            password_hash: "not-a-password-hash".to_string(),
            roles: roles.to_vec(),
        })
        .await
        .expect("Failed to seed user")
}

/// `Authorization` header value for `user`.
pub fn bearer(state: &AppState, user: &UserDBResponse) -> String {
    let token = create_session_token(&CurrentUser::from(user), &state.config).expect("Failed to create session token");
    format!("Bearer {token}")
}

/// An [`InMemoryStore`] that yields to the scheduler before every call.
///
/// Two service calls driven with `tokio::join!` then alternate store calls,
/// so both read before either writes, as concurrent requests can on Postgres.
#[derive(Clone)]
pub struct InterleavingStore {
    pub inner: InMemoryStore,
}

impl InterleavingStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: InMemoryStore::new(events),
        }
    }
}

#[async_trait::async_trait]
impl Store for InterleavingStore {
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        yield_now().await;
        self.inner.create_user(request).await
    }
    async fn get_user(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        yield_now().await;
        self.inner.get_user(id).await
    }
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        yield_now().await;
        self.inner.get_user_by_email(email).await
    }
    async fn grant_role(&self, user_id: UserId, role: AppRole) -> Result<()> {
        yield_now().await;
        self.inner.grant_role(user_id, role).await
    }
    async fn set_password(&self, user_id: UserId, password_hash: &str) -> Result<()> {
        yield_now().await;
        self.inner.set_password(user_id, password_hash).await
    }
    async fn record_login(&self, user_id: UserId) -> Result<()> {
        yield_now().await;
        self.inner.record_login(user_id).await
    }

    async fn get_profile(&self, user_id: UserId) -> Result<Option<ProfileDBResponse>> {
        yield_now().await;
        self.inner.get_profile(user_id).await
    }
    async fn create_profile(&self, request: &ProfileCreateDBRequest) -> Result<ProfileDBResponse> {
        yield_now().await;
        self.inner.create_profile(request).await
    }
    async fn update_profile(&self, user_id: UserId, request: &ProfileUpdateDBRequest) -> Result<ProfileDBResponse> {
        yield_now().await;
        self.inner.update_profile(user_id, request).await
    }

    async fn create_question(&self, request: &QuestionCreateDBRequest) -> Result<QuestionDBResponse> {
        yield_now().await;
        self.inner.create_question(request).await
    }
    async fn get_question(&self, id: QuestionId) -> Result<Option<QuestionDBResponse>> {
        yield_now().await;
        self.inner.get_question(id).await
    }
    async fn list_questions(&self, filter: &QuestionFilter) -> Result<Vec<QuestionDBResponse>> {
        yield_now().await;
        self.inner.list_questions(filter).await
    }
    async fn create_answer(&self, request: &AnswerCreateDBRequest) -> Result<AnswerDBResponse> {
        yield_now().await;
        self.inner.create_answer(request).await
    }
    async fn get_answer(&self, id: AnswerId) -> Result<Option<AnswerDBResponse>> {
        yield_now().await;
        self.inner.get_answer(id).await
    }
    async fn list_answers(&self, question_id: QuestionId) -> Result<Vec<AnswerDBResponse>> {
        yield_now().await;
        self.inner.list_answers(question_id).await
    }

    async fn find_vote(&self, target: VoteTarget, user_id: UserId) -> Result<Option<VoteDBResponse>> {
        yield_now().await;
        self.inner.find_vote(target, user_id).await
    }
    async fn insert_vote(&self, target: VoteTarget, user_id: UserId, value: VoteValue) -> Result<VoteDBResponse> {
        yield_now().await;
        self.inner.insert_vote(target, user_id, value).await
    }
    async fn update_vote(&self, target: VoteTarget, vote_id: Uuid, value: VoteValue) -> Result<VoteDBResponse> {
        yield_now().await;
        self.inner.update_vote(target, vote_id, value).await
    }
    async fn delete_vote(&self, target: VoteTarget, vote_id: Uuid) -> Result<bool> {
        yield_now().await;
        self.inner.delete_vote(target, vote_id).await
    }
    async fn list_answer_votes(&self, question_id: QuestionId, user_id: UserId) -> Result<Vec<VoteDBResponse>> {
        yield_now().await;
        self.inner.list_answer_votes(question_id, user_id).await
    }

    async fn create_group_with_admin(&self, request: &StudyGroupCreateDBRequest) -> Result<StudyGroupDBResponse> {
        yield_now().await;
        self.inner.create_group_with_admin(request).await
    }
    async fn get_group(&self, id: GroupId) -> Result<Option<StudyGroupDBResponse>> {
        yield_now().await;
        self.inner.get_group(id).await
    }
    async fn list_groups(&self, filter: &GroupFilter) -> Result<Vec<StudyGroupDBResponse>> {
        yield_now().await;
        self.inner.list_groups(filter).await
    }
    async fn get_membership(&self, group_id: GroupId, user_id: UserId) -> Result<Option<MembershipDBResponse>> {
        yield_now().await;
        self.inner.get_membership(group_id, user_id).await
    }
    async fn add_membership(&self, group_id: GroupId, user_id: UserId, role: MembershipRole) -> Result<MembershipDBResponse> {
        yield_now().await;
        self.inner.add_membership(group_id, user_id, role).await
    }
    async fn list_members(&self, group_id: GroupId) -> Result<Vec<MemberDBResponse>> {
        yield_now().await;
        self.inner.list_members(group_id).await
    }
    async fn list_user_memberships(&self, user_id: UserId) -> Result<Vec<MembershipDBResponse>> {
        yield_now().await;
        self.inner.list_user_memberships(user_id).await
    }

    async fn create_join_request(&self, request: &JoinRequestCreateDBRequest) -> Result<JoinRequestDBResponse> {
        yield_now().await;
        self.inner.create_join_request(request).await
    }
    async fn get_join_request(&self, id: JoinRequestId) -> Result<Option<JoinRequestDBResponse>> {
        yield_now().await;
        self.inner.get_join_request(id).await
    }
    async fn find_pending_join_request(&self, group_id: GroupId, user_id: UserId) -> Result<Option<JoinRequestDBResponse>> {
        yield_now().await;
        self.inner.find_pending_join_request(group_id, user_id).await
    }
    async fn list_join_requests(&self, group_id: GroupId, status: Option<JoinRequestStatus>) -> Result<Vec<JoinRequestDBResponse>> {
        yield_now().await;
        self.inner.list_join_requests(group_id, status).await
    }
    async fn review_join_request(
        &self,
        id: JoinRequestId,
        reviewer: UserId,
        decision: JoinRequestDecision,
    ) -> Result<Option<JoinRequestDBResponse>> {
        yield_now().await;
        self.inner.review_join_request(id, reviewer, decision).await
    }

    async fn create_message(&self, request: &MessageCreateDBRequest) -> Result<MessageDBResponse> {
        yield_now().await;
        self.inner.create_message(request).await
    }
    async fn get_message(&self, id: MessageId) -> Result<Option<MessageDBResponse>> {
        yield_now().await;
        self.inner.get_message(id).await
    }
    async fn list_messages(&self, group_id: GroupId) -> Result<Vec<MessageDBResponse>> {
        yield_now().await;
        self.inner.list_messages(group_id).await
    }
}
