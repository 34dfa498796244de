//! Postgres-backed [`Store`] built from the repositories in [`crate::db::handlers`].

use sqlx::PgPool;
use sqlx::pool::PoolConnection;
use sqlx::Postgres;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::Store;
use crate::db::{
    errors::{DbError, Result},
    handlers::{
        Answers, JoinRequests, Memberships, Messages, Profiles, Questions, Repository, StudyGroups, Users, Votes,
        join_requests::JoinRequestFilter,
    },
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
    VoteValue, abbrev_uuid,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<PoolConnection<Postgres>> {
        Ok(self.pool.acquire().await?)
    }
}

#[async_trait::async_trait]
impl Store for PgStore {
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let mut tx = self.pool.begin().await?;
        let user = Users::new(&mut tx).create(request).await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let mut conn = self.conn().await?;
        Users::new(&mut conn).get_by_id(id).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let mut conn = self.conn().await?;
        Users::new(&mut conn).get_by_email(email).await
    }

    async fn grant_role(&self, user_id: UserId, role: AppRole) -> Result<()> {
        let mut conn = self.conn().await?;
        Users::new(&mut conn).grant_role(user_id, role).await
    }

    async fn set_password(&self, user_id: UserId, password_hash: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        Users::new(&mut conn).set_password(user_id, password_hash).await
    }

    async fn record_login(&self, user_id: UserId) -> Result<()> {
        let mut conn = self.conn().await?;
        Users::new(&mut conn).record_login(user_id).await
    }

    async fn get_profile(&self, user_id: UserId) -> Result<Option<ProfileDBResponse>> {
        let mut conn = self.conn().await?;
        Profiles::new(&mut conn).get_by_user(user_id).await
    }

    async fn create_profile(&self, request: &ProfileCreateDBRequest) -> Result<ProfileDBResponse> {
        let mut conn = self.conn().await?;
        Profiles::new(&mut conn).create(request).await
    }

    async fn update_profile(&self, user_id: UserId, request: &ProfileUpdateDBRequest) -> Result<ProfileDBResponse> {
        let mut conn = self.conn().await?;
        Profiles::new(&mut conn).update(user_id, request).await
    }

    async fn create_question(&self, request: &QuestionCreateDBRequest) -> Result<QuestionDBResponse> {
        let mut conn = self.conn().await?;
        Questions::new(&mut conn).create(request).await
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<QuestionDBResponse>> {
        let mut conn = self.conn().await?;
        Questions::new(&mut conn).get_by_id(id).await
    }

    async fn list_questions(&self, filter: &QuestionFilter) -> Result<Vec<QuestionDBResponse>> {
        let mut conn = self.conn().await?;
        Questions::new(&mut conn).list(filter).await
    }

    async fn create_answer(&self, request: &AnswerCreateDBRequest) -> Result<AnswerDBResponse> {
        let mut conn = self.conn().await?;
        Answers::new(&mut conn).create(request).await
    }

    async fn get_answer(&self, id: AnswerId) -> Result<Option<AnswerDBResponse>> {
        let mut conn = self.conn().await?;
        Answers::new(&mut conn).get_by_id(id).await
    }

    async fn list_answers(&self, question_id: QuestionId) -> Result<Vec<AnswerDBResponse>> {
        let mut conn = self.conn().await?;
        Answers::new(&mut conn).list(&question_id).await
    }

    async fn find_vote(&self, target: VoteTarget, user_id: UserId) -> Result<Option<VoteDBResponse>> {
        let mut conn = self.conn().await?;
        Votes::new(&mut conn).find(target, user_id).await
    }

    async fn insert_vote(&self, target: VoteTarget, user_id: UserId, value: VoteValue) -> Result<VoteDBResponse> {
        let mut conn = self.conn().await?;
        Votes::new(&mut conn).insert(target, user_id, value).await
    }

    async fn update_vote(&self, target: VoteTarget, vote_id: Uuid, value: VoteValue) -> Result<VoteDBResponse> {
        let mut conn = self.conn().await?;
        Votes::new(&mut conn).update(target, vote_id, value).await
    }

    async fn delete_vote(&self, target: VoteTarget, vote_id: Uuid) -> Result<bool> {
        let mut conn = self.conn().await?;
        Votes::new(&mut conn).delete(target, vote_id).await
    }

    async fn list_answer_votes(&self, question_id: QuestionId, user_id: UserId) -> Result<Vec<VoteDBResponse>> {
        let mut conn = self.conn().await?;
        Votes::new(&mut conn).list_for_answers(question_id, user_id).await
    }

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create_group_with_admin(&self, request: &StudyGroupCreateDBRequest) -> Result<StudyGroupDBResponse> {
        let mut tx = self.pool.begin().await?;
        let group = StudyGroups::new(&mut tx).create(request).await?;
        Memberships::new(&mut tx)
            .add(group.id, request.created_by, MembershipRole::Admin)
            .await?;
        let group = StudyGroups::new(&mut tx).get_by_id(group.id).await?.ok_or(DbError::NotFound)?;
        tx.commit().await?;
        debug!("Created study group {} with admin {}", abbrev_uuid(&group.id), abbrev_uuid(&request.created_by));
        Ok(group)
    }

    async fn get_group(&self, id: GroupId) -> Result<Option<StudyGroupDBResponse>> {
        let mut conn = self.conn().await?;
        StudyGroups::new(&mut conn).get_by_id(id).await
    }

    async fn list_groups(&self, filter: &GroupFilter) -> Result<Vec<StudyGroupDBResponse>> {
        let mut conn = self.conn().await?;
        StudyGroups::new(&mut conn).list(filter).await
    }

    async fn get_membership(&self, group_id: GroupId, user_id: UserId) -> Result<Option<MembershipDBResponse>> {
        let mut conn = self.conn().await?;
        Memberships::new(&mut conn).get(group_id, user_id).await
    }

    async fn add_membership(&self, group_id: GroupId, user_id: UserId, role: MembershipRole) -> Result<MembershipDBResponse> {
        let mut conn = self.conn().await?;
        Memberships::new(&mut conn).add(group_id, user_id, role).await
    }

    async fn list_members(&self, group_id: GroupId) -> Result<Vec<MemberDBResponse>> {
        let mut conn = self.conn().await?;
        Memberships::new(&mut conn).list_members(group_id).await
    }

    async fn list_user_memberships(&self, user_id: UserId) -> Result<Vec<MembershipDBResponse>> {
        let mut conn = self.conn().await?;
        Memberships::new(&mut conn).list_for_user(user_id).await
    }

    async fn create_join_request(&self, request: &JoinRequestCreateDBRequest) -> Result<JoinRequestDBResponse> {
        let mut conn = self.conn().await?;
        JoinRequests::new(&mut conn).create(request).await
    }

    async fn get_join_request(&self, id: JoinRequestId) -> Result<Option<JoinRequestDBResponse>> {
        let mut conn = self.conn().await?;
        JoinRequests::new(&mut conn).get_by_id(id).await
    }

    async fn find_pending_join_request(&self, group_id: GroupId, user_id: UserId) -> Result<Option<JoinRequestDBResponse>> {
        let mut conn = self.conn().await?;
        JoinRequests::new(&mut conn).find_pending(group_id, user_id).await
    }

    async fn list_join_requests(&self, group_id: GroupId, status: Option<JoinRequestStatus>) -> Result<Vec<JoinRequestDBResponse>> {
        let mut conn = self.conn().await?;
        JoinRequests::new(&mut conn).list(&JoinRequestFilter { group_id, status }).await
    }

    #[instrument(skip(self, id, reviewer), fields(request_id = %abbrev_uuid(&id)), err)]
    async fn review_join_request(
        &self,
        id: JoinRequestId,
        reviewer: UserId,
        decision: JoinRequestDecision,
    ) -> Result<Option<JoinRequestDBResponse>> {
        let mut tx = self.pool.begin().await?;
        let Some(request) = JoinRequests::new(&mut tx).review(id, reviewer, decision.status()).await? else {
            return Ok(None);
        };
        if decision == JoinRequestDecision::Approve {
            Memberships::new(&mut tx)
                .add_if_absent(request.group_id, request.user_id, MembershipRole::Member)
                .await?;
        }
        tx.commit().await?;
        Ok(Some(request))
    }

    async fn create_message(&self, request: &MessageCreateDBRequest) -> Result<MessageDBResponse> {
        let mut conn = self.conn().await?;
        Messages::new(&mut conn).create(request).await
    }

    async fn get_message(&self, id: MessageId) -> Result<Option<MessageDBResponse>> {
        let mut conn = self.conn().await?;
        Messages::new(&mut conn).get_by_id(id).await
    }

    async fn list_messages(&self, group_id: GroupId) -> Result<Vec<MessageDBResponse>> {
        let mut conn = self.conn().await?;
        Messages::new(&mut conn).list(&group_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GradeLevel;

    async fn create_user(store: &PgStore, email: &str) -> UserDBResponse {
        store
            .create_user(&UserCreateDBRequest {
                email: email.to_string(),
                password_hash: "not-a-real-hash".to_string(),
                roles: vec![AppRole::User],
            })
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_vote_triggers_maintain_question_totals(pool: PgPool) {
        let store = PgStore::new(pool);
        let author = create_user(&store, "author@example.com").await;
        let voter = create_user(&store, "voter@example.com").await;

        let question = store
            .create_question(&QuestionCreateDBRequest {
                user_id: author.id,
                title: "Why is the sky blue?".to_string(),
                content: "Rayleigh scattering?".to_string(),
                subject: "Physics".to_string(),
                grade_level: GradeLevel::High,
                tags: vec!["optics".to_string()],
            })
            .await
            .unwrap();
        let target = VoteTarget::Question(question.id);

        let vote = store.insert_vote(target, voter.id, VoteValue::Up).await.unwrap();
        assert_eq!(store.get_question(question.id).await.unwrap().unwrap().votes, 1);

        store.update_vote(target, vote.id, VoteValue::Down).await.unwrap();
        assert_eq!(store.get_question(question.id).await.unwrap().unwrap().votes, -1);

        assert!(store.delete_vote(target, vote.id).await.unwrap());
        assert_eq!(store.get_question(question.id).await.unwrap().unwrap().votes, 0);

        store
            .create_answer(&AnswerCreateDBRequest {
                question_id: question.id,
                user_id: voter.id,
                content: "Yes".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(store.get_question(question.id).await.unwrap().unwrap().answer_count, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_approval_inserts_membership_in_same_transaction(pool: PgPool) {
        let store = PgStore::new(pool);
        let admin = create_user(&store, "admin@example.com").await;
        let student = create_user(&store, "student@example.com").await;

        let group = store
            .create_group_with_admin(&StudyGroupCreateDBRequest {
                name: "Private study".to_string(),
                description: None,
                subject: "History".to_string(),
                created_by: admin.id,
                is_public: false,
                member_limit: 5,
            })
            .await
            .unwrap();
        assert_eq!(group.member_count, 1);

        let request = store
            .create_join_request(&JoinRequestCreateDBRequest {
                group_id: group.id,
                user_id: student.id,
                message: Some("Please".to_string()),
            })
            .await
            .unwrap();

        let reviewed = store
            .review_join_request(request.id, admin.id, JoinRequestDecision::Approve)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reviewed.status, JoinRequestStatus::Approved);
        assert_eq!(reviewed.reviewed_by, Some(admin.id));
        assert!(store.get_membership(group.id, student.id).await.unwrap().is_some());

        // Already reviewed
        assert!(
            store
                .review_join_request(request.id, admin.id, JoinRequestDecision::Reject)
                .await
                .unwrap()
                .is_none()
        );
    }
}
