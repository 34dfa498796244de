//! In-memory storage implementation.
//!
//! All tables live behind one lock, so each store call is atomic on its own.
//! Sequences of calls are not, which keeps the same check-then-act races the
//! Postgres store has. Vote totals and answer counts are maintained here the
//! way the database triggers maintain them, and message inserts are announced
//! on the realtime channel. Data is lost on restart.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::Store;
use crate::db::{
    errors::{DbError, Result},
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
use crate::realtime::{MessageEvents, MessageInserted};
use crate::types::{
    AnswerId, AppRole, GroupId, JoinRequestId, JoinRequestStatus, MembershipRole, MessageId, QuestionId, UserId, VoteTarget,
    VoteValue, abbrev_uuid,
};

#[derive(Debug, Clone)]
struct StoredMessage {
    id: MessageId,
    group_id: GroupId,
    user_id: UserId,
    content: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredJoinRequest {
    id: JoinRequestId,
    group_id: GroupId,
    user_id: UserId,
    message: Option<String>,
    status: JoinRequestStatus,
    requested_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
    reviewed_by: Option<UserId>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, UserDBResponse>,
    profiles: HashMap<UserId, ProfileDBResponse>,
    questions: HashMap<QuestionId, QuestionDBResponse>,
    answers: HashMap<AnswerId, AnswerDBResponse>,
    question_votes: HashMap<Uuid, VoteDBResponse>,
    answer_votes: HashMap<Uuid, VoteDBResponse>,
    groups: HashMap<GroupId, StudyGroupDBResponse>,
    memberships: Vec<MembershipDBResponse>,
    messages: Vec<StoredMessage>,
    join_requests: HashMap<JoinRequestId, StoredJoinRequest>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Tables {
    /// Strictly increasing timestamps, so creation order is never ambiguous.
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp
            && now <= last
        {
            now = last + Duration::microseconds(1);
        }
        self.last_timestamp = Some(now);
        now
    }

    fn names(&self, user_id: UserId) -> (Option<String>, Option<String>) {
        match self.profiles.get(&user_id) {
            Some(profile) => (Some(profile.first_name.clone()), Some(profile.last_name.clone())),
            None => (None, None),
        }
    }

    fn member_count(&self, group_id: GroupId) -> i64 {
        self.memberships.iter().filter(|m| m.group_id == group_id).count() as i64
    }

    fn group_with_count(&self, group: &StudyGroupDBResponse) -> StudyGroupDBResponse {
        StudyGroupDBResponse {
            member_count: self.member_count(group.id),
            ..group.clone()
        }
    }

    fn message_response(&self, message: &StoredMessage) -> MessageDBResponse {
        let (first_name, last_name) = self.names(message.user_id);
        MessageDBResponse {
            id: message.id,
            group_id: message.group_id,
            user_id: message.user_id,
            content: message.content.clone(),
            created_at: message.created_at,
            first_name,
            last_name,
        }
    }

    fn join_request_response(&self, request: &StoredJoinRequest) -> JoinRequestDBResponse {
        let (first_name, last_name) = self.names(request.user_id);
        JoinRequestDBResponse {
            id: request.id,
            group_id: request.group_id,
            user_id: request.user_id,
            message: request.message.clone(),
            status: request.status,
            requested_at: request.requested_at,
            reviewed_at: request.reviewed_at,
            reviewed_by: request.reviewed_by,
            first_name,
            last_name,
        }
    }

    fn require_user(&self, user_id: UserId, table: &str) -> Result<()> {
        if self.users.contains_key(&user_id) {
            Ok(())
        } else {
            Err(DbError::foreign_key(table, &format!("{table}_user_id_fkey")))
        }
    }

    fn require_group(&self, group_id: GroupId, table: &str) -> Result<()> {
        if self.groups.contains_key(&group_id) {
            Ok(())
        } else {
            Err(DbError::foreign_key(table, &format!("{table}_group_id_fkey")))
        }
    }

    fn insert_membership(&mut self, group_id: GroupId, user_id: UserId, role: MembershipRole) -> Result<MembershipDBResponse> {
        self.require_group(group_id, "group_memberships")?;
        self.require_user(user_id, "group_memberships")?;
        if self.memberships.iter().any(|m| m.group_id == group_id && m.user_id == user_id) {
            return Err(DbError::unique("group_memberships", "group_memberships_group_id_user_id_key"));
        }
        let membership = MembershipDBResponse {
            id: Uuid::new_v4(),
            group_id,
            user_id,
            role,
            joined_at: self.now(),
        };
        self.memberships.push(membership.clone());
        Ok(membership)
    }

    fn votes_table(&mut self, target: &VoteTarget) -> &mut HashMap<Uuid, VoteDBResponse> {
        match target {
            VoteTarget::Question(_) => &mut self.question_votes,
            VoteTarget::Answer(_) => &mut self.answer_votes,
        }
    }

    /// Apply a vote delta to the target's running total.
    fn adjust_votes(&mut self, target: &VoteTarget, delta: i32) {
        match target {
            VoteTarget::Question(id) => {
                if let Some(question) = self.questions.get_mut(id) {
                    question.votes += delta;
                }
            }
            VoteTarget::Answer(id) => {
                if let Some(answer) = self.answers.get_mut(id) {
                    answer.votes += delta;
                }
            }
        }
    }
}

/// In-memory implementation of the [`Store`] trait.
#[derive(Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    events: MessageEvents,
}

impl InMemoryStore {
    /// Create an empty store that announces new chat messages on `events`.
    pub fn new(events: MessageEvents) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            events,
        }
    }
}

#[async_trait::async_trait]
impl Store for InMemoryStore {
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let mut tables = self.tables.write();
        if tables.users.values().any(|u| u.email.eq_ignore_ascii_case(&request.email)) {
            return Err(DbError::unique("users", "users_email_key"));
        }
        let now = tables.now();
        let mut roles = request.roles.clone();
        roles.sort_by_key(|r| *r as u8);
        roles.dedup();
        let user = UserDBResponse {
            id: Uuid::new_v4(),
            email: request.email.clone(),
            password_hash: request.password_hash.clone(),
            roles,
            created_at: now,
            updated_at: now,
            last_login: None,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn grant_role(&self, user_id: UserId, role: AppRole) -> Result<()> {
        let mut tables = self.tables.write();
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| DbError::foreign_key("user_roles", "user_roles_user_id_fkey"))?;
        if !user.roles.contains(&role) {
            user.roles.push(role);
            user.roles.sort_by_key(|r| *r as u8);
        }
        Ok(())
    }

    async fn set_password(&self, user_id: UserId, password_hash: &str) -> Result<()> {
        let mut tables = self.tables.write();
        let now = tables.now();
        let user = tables.users.get_mut(&user_id).ok_or(DbError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = now;
        Ok(())
    }

    async fn record_login(&self, user_id: UserId) -> Result<()> {
        let mut tables = self.tables.write();
        let now = tables.now();
        if let Some(user) = tables.users.get_mut(&user_id) {
            user.last_login = Some(now);
        }
        Ok(())
    }

    async fn get_profile(&self, user_id: UserId) -> Result<Option<ProfileDBResponse>> {
        Ok(self.tables.read().profiles.get(&user_id).cloned())
    }

    async fn create_profile(&self, request: &ProfileCreateDBRequest) -> Result<ProfileDBResponse> {
        let mut tables = self.tables.write();
        tables.require_user(request.user_id, "profiles")?;
        if tables.profiles.contains_key(&request.user_id) {
            return Err(DbError::unique("profiles", "profiles_user_id_key"));
        }
        let now = tables.now();
        let profile = ProfileDBResponse {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            grade_level: request.grade_level,
            school_type: request.school_type,
            subjects: request.subjects.clone(),
            bio: request.bio.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.profiles.insert(request.user_id, profile.clone());
        Ok(profile)
    }

    async fn update_profile(&self, user_id: UserId, request: &ProfileUpdateDBRequest) -> Result<ProfileDBResponse> {
        let mut tables = self.tables.write();
        let now = tables.now();
        let profile = tables.profiles.get_mut(&user_id).ok_or(DbError::NotFound)?;
        profile.first_name = request.first_name.clone();
        profile.last_name = request.last_name.clone();
        profile.grade_level = request.grade_level;
        profile.school_type = request.school_type;
        profile.subjects = request.subjects.clone();
        profile.bio = request.bio.clone();
        profile.updated_at = now;
        Ok(profile.clone())
    }

    async fn create_question(&self, request: &QuestionCreateDBRequest) -> Result<QuestionDBResponse> {
        let mut tables = self.tables.write();
        tables.require_user(request.user_id, "questions")?;
        let now = tables.now();
        let question = QuestionDBResponse {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            title: request.title.clone(),
            content: request.content.clone(),
            subject: request.subject.clone(),
            grade_level: request.grade_level,
            tags: request.tags.clone(),
            votes: 0,
            answer_count: 0,
            created_at: now,
            updated_at: now,
        };
        tables.questions.insert(question.id, question.clone());
        Ok(question)
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<QuestionDBResponse>> {
        Ok(self.tables.read().questions.get(&id).cloned())
    }

    async fn list_questions(&self, filter: &QuestionFilter) -> Result<Vec<QuestionDBResponse>> {
        let tables = self.tables.read();
        let mut questions: Vec<_> = tables.questions.values().filter(|q| filter.matches(q)).cloned().collect();
        questions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(questions)
    }

    async fn create_answer(&self, request: &AnswerCreateDBRequest) -> Result<AnswerDBResponse> {
        let mut tables = self.tables.write();
        tables.require_user(request.user_id, "answers")?;
        if !tables.questions.contains_key(&request.question_id) {
            return Err(DbError::foreign_key("answers", "answers_question_id_fkey"));
        }
        let now = tables.now();
        let answer = AnswerDBResponse {
            id: Uuid::new_v4(),
            question_id: request.question_id,
            user_id: request.user_id,
            content: request.content.clone(),
            votes: 0,
            created_at: now,
            updated_at: now,
        };
        tables.answers.insert(answer.id, answer.clone());
        if let Some(question) = tables.questions.get_mut(&request.question_id) {
            question.answer_count += 1;
        }
        Ok(answer)
    }

    async fn get_answer(&self, id: AnswerId) -> Result<Option<AnswerDBResponse>> {
        Ok(self.tables.read().answers.get(&id).cloned())
    }

    async fn list_answers(&self, question_id: QuestionId) -> Result<Vec<AnswerDBResponse>> {
        let tables = self.tables.read();
        let mut answers: Vec<_> = tables
            .answers
            .values()
            .filter(|a| a.question_id == question_id)
            .cloned()
            .collect();
        answers.sort_by(|a, b| {
            b.votes
                .cmp(&a.votes)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(answers)
    }

    async fn find_vote(&self, target: VoteTarget, user_id: UserId) -> Result<Option<VoteDBResponse>> {
        let mut tables = self.tables.write();
        Ok(tables
            .votes_table(&target)
            .values()
            .find(|v| v.target_id == target.id() && v.user_id == user_id)
            .cloned())
    }

    async fn insert_vote(&self, target: VoteTarget, user_id: UserId, value: VoteValue) -> Result<VoteDBResponse> {
        let mut tables = self.tables.write();
        tables.require_user(user_id, "votes")?;
        let target_exists = match target {
            VoteTarget::Question(id) => tables.questions.contains_key(&id),
            VoteTarget::Answer(id) => tables.answers.contains_key(&id),
        };
        if !target_exists {
            return Err(DbError::foreign_key(
                &format!("{}_votes", target.kind()),
                &format!("{}_votes_{}_id_fkey", target.kind(), target.kind()),
            ));
        }
        if tables
            .votes_table(&target)
            .values()
            .any(|v| v.target_id == target.id() && v.user_id == user_id)
        {
            let table = format!("{}_votes", target.kind());
            return Err(DbError::unique(&table, &format!("{table}_user_id_{}_id_key", target.kind())));
        }
        let vote = VoteDBResponse {
            id: Uuid::new_v4(),
            target_id: target.id(),
            user_id,
            value,
            created_at: tables.now(),
        };
        tables.votes_table(&target).insert(vote.id, vote.clone());
        tables.adjust_votes(&target, i32::from(value.as_i16()));
        Ok(vote)
    }

    async fn update_vote(&self, target: VoteTarget, vote_id: Uuid, value: VoteValue) -> Result<VoteDBResponse> {
        let mut tables = self.tables.write();
        let vote = tables.votes_table(&target).get_mut(&vote_id).ok_or(DbError::NotFound)?;
        let previous = vote.value;
        vote.value = value;
        let updated = vote.clone();
        tables.adjust_votes(&target, i32::from(value.as_i16()) - i32::from(previous.as_i16()));
        Ok(updated)
    }

    async fn delete_vote(&self, target: VoteTarget, vote_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write();
        match tables.votes_table(&target).remove(&vote_id) {
            Some(vote) => {
                tables.adjust_votes(&target, -i32::from(vote.value.as_i16()));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_answer_votes(&self, question_id: QuestionId, user_id: UserId) -> Result<Vec<VoteDBResponse>> {
        let tables = self.tables.read();
        Ok(tables
            .answer_votes
            .values()
            .filter(|v| {
                v.user_id == user_id
                    && tables
                        .answers
                        .get(&v.target_id)
                        .is_some_and(|a| a.question_id == question_id)
            })
            .cloned()
            .collect())
    }

    async fn create_group_with_admin(&self, request: &StudyGroupCreateDBRequest) -> Result<StudyGroupDBResponse> {
        let mut tables = self.tables.write();
        tables.require_user(request.created_by, "study_groups")?;
        let now = tables.now();
        let group = StudyGroupDBResponse {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            description: request.description.clone(),
            subject: request.subject.clone(),
            created_by: request.created_by,
            is_public: request.is_public,
            member_limit: request.member_limit,
            member_count: 0,
            created_at: now,
            updated_at: now,
        };
        tables.groups.insert(group.id, group.clone());
        tables.insert_membership(group.id, request.created_by, MembershipRole::Admin)?;
        debug!("Created study group {} with admin {}", abbrev_uuid(&group.id), abbrev_uuid(&request.created_by));
        Ok(tables.group_with_count(&group))
    }

    async fn get_group(&self, id: GroupId) -> Result<Option<StudyGroupDBResponse>> {
        let tables = self.tables.read();
        Ok(tables.groups.get(&id).map(|g| tables.group_with_count(g)))
    }

    async fn list_groups(&self, filter: &GroupFilter) -> Result<Vec<StudyGroupDBResponse>> {
        let tables = self.tables.read();
        let mut groups: Vec<_> = tables
            .groups
            .values()
            .filter(|g| filter.matches(g))
            .map(|g| tables.group_with_count(g))
            .collect();
        groups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn get_membership(&self, group_id: GroupId, user_id: UserId) -> Result<Option<MembershipDBResponse>> {
        Ok(self
            .tables
            .read()
            .memberships
            .iter()
            .find(|m| m.group_id == group_id && m.user_id == user_id)
            .cloned())
    }

    async fn add_membership(&self, group_id: GroupId, user_id: UserId, role: MembershipRole) -> Result<MembershipDBResponse> {
        self.tables.write().insert_membership(group_id, user_id, role)
    }

    async fn list_members(&self, group_id: GroupId) -> Result<Vec<MemberDBResponse>> {
        let tables = self.tables.read();
        Ok(tables
            .memberships
            .iter()
            .filter(|m| m.group_id == group_id)
            .map(|m| {
                let (first_name, last_name) = tables.names(m.user_id);
                MemberDBResponse {
                    user_id: m.user_id,
                    role: m.role,
                    joined_at: m.joined_at,
                    first_name,
                    last_name,
                }
            })
            .collect())
    }

    async fn list_user_memberships(&self, user_id: UserId) -> Result<Vec<MembershipDBResponse>> {
        Ok(self
            .tables
            .read()
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_join_request(&self, request: &JoinRequestCreateDBRequest) -> Result<JoinRequestDBResponse> {
        let mut tables = self.tables.write();
        tables.require_group(request.group_id, "join_requests")?;
        tables.require_user(request.user_id, "join_requests")?;
        if tables
            .join_requests
            .values()
            .any(|r| r.group_id == request.group_id && r.user_id == request.user_id && r.status == JoinRequestStatus::Pending)
        {
            return Err(DbError::unique("join_requests", "idx_join_requests_one_pending"));
        }
        let stored = StoredJoinRequest {
            id: Uuid::new_v4(),
            group_id: request.group_id,
            user_id: request.user_id,
            message: request.message.clone(),
            status: JoinRequestStatus::Pending,
            requested_at: tables.now(),
            reviewed_at: None,
            reviewed_by: None,
        };
        tables.join_requests.insert(stored.id, stored.clone());
        Ok(tables.join_request_response(&stored))
    }

    async fn get_join_request(&self, id: JoinRequestId) -> Result<Option<JoinRequestDBResponse>> {
        let tables = self.tables.read();
        Ok(tables.join_requests.get(&id).map(|r| tables.join_request_response(r)))
    }

    async fn find_pending_join_request(&self, group_id: GroupId, user_id: UserId) -> Result<Option<JoinRequestDBResponse>> {
        let tables = self.tables.read();
        Ok(tables
            .join_requests
            .values()
            .find(|r| r.group_id == group_id && r.user_id == user_id && r.status == JoinRequestStatus::Pending)
            .map(|r| tables.join_request_response(r)))
    }

    async fn list_join_requests(&self, group_id: GroupId, status: Option<JoinRequestStatus>) -> Result<Vec<JoinRequestDBResponse>> {
        let tables = self.tables.read();
        let mut requests: Vec<_> = tables
            .join_requests
            .values()
            .filter(|r| r.group_id == group_id && status.is_none_or(|s| r.status == s))
            .collect();
        requests.sort_by(|a, b| a.requested_at.cmp(&b.requested_at).then(a.id.cmp(&b.id)));
        Ok(requests.into_iter().map(|r| tables.join_request_response(r)).collect())
    }

    async fn review_join_request(
        &self,
        id: JoinRequestId,
        reviewer: UserId,
        decision: JoinRequestDecision,
    ) -> Result<Option<JoinRequestDBResponse>> {
        let mut tables = self.tables.write();
        let now = tables.now();
        let Some((group_id, user_id)) = tables
            .join_requests
            .get(&id)
            .filter(|r| r.status == JoinRequestStatus::Pending)
            .map(|r| (r.group_id, r.user_id))
        else {
            return Ok(None);
        };

        // Membership first: a failed insert leaves the request pending
        if decision == JoinRequestDecision::Approve
            && !tables.memberships.iter().any(|m| m.group_id == group_id && m.user_id == user_id)
        {
            tables.insert_membership(group_id, user_id, MembershipRole::Member)?;
        }

        let Some(request) = tables.join_requests.get_mut(&id) else {
            return Ok(None);
        };
        request.status = decision.status();
        request.reviewed_at = Some(now);
        request.reviewed_by = Some(reviewer);
        let reviewed = request.clone();
        Ok(Some(tables.join_request_response(&reviewed)))
    }

    async fn create_message(&self, request: &MessageCreateDBRequest) -> Result<MessageDBResponse> {
        let response = {
            let mut tables = self.tables.write();
            tables.require_group(request.group_id, "group_messages")?;
            tables.require_user(request.user_id, "group_messages")?;
            let stored = StoredMessage {
                id: Uuid::new_v4(),
                group_id: request.group_id,
                user_id: request.user_id,
                content: request.content.clone(),
                created_at: tables.now(),
            };
            tables.messages.push(stored.clone());
            tables.message_response(&stored)
        };
        // Mirrors the NOTIFY trigger. No subscribers is not an error
        let receivers = self
            .events
            .send(MessageInserted {
                id: response.id,
                group_id: response.group_id,
            })
            .unwrap_or(0);
        debug!("Forwarded message event to {} subscribers", receivers);
        Ok(response)
    }

    async fn get_message(&self, id: MessageId) -> Result<Option<MessageDBResponse>> {
        let tables = self.tables.read();
        Ok(tables
            .messages
            .iter()
            .find(|m| m.id == id)
            .map(|m| tables.message_response(m)))
    }

    async fn list_messages(&self, group_id: GroupId) -> Result<Vec<MessageDBResponse>> {
        let tables = self.tables.read();
        let mut messages: Vec<_> = tables
            .messages
            .iter()
            .filter(|m| m.group_id == group_id)
            .map(|m| tables.message_response(m))
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(messages)
    }
}

#[cfg(test)]
impl InMemoryStore {
    /// Create a plain user with the `user` app role.
    pub async fn seed_user(&self, email: &str) -> UserDBResponse {
        self.create_user(&UserCreateDBRequest {
            email: email.to_string(),
            password_hash: "unused".to_string(),
            roles: vec![AppRole::User],
        })
        .await
        .expect("seed user")
    }

    /// Create a group with `creator` as its admin.
    pub async fn seed_group(&self, creator: UserId, name: &str, is_public: bool, member_limit: i32) -> StudyGroupDBResponse {
        self.create_group_with_admin(&StudyGroupCreateDBRequest {
            name: name.to_string(),
            description: None,
            subject: "Math".to_string(),
            created_by: creator,
            is_public,
            member_limit,
        })
        .await
        .expect("seed group")
    }
}
