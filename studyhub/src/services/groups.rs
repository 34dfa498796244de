//! Study group rules: creation, direct joins, the join-request workflow and
//! the access flags the API reports for a group.
//!
//! Capacity is checked against the member count read before the insert, so
//! concurrent joins can overshoot `member_limit`. Approvals never check
//! capacity.

use tracing::{debug, info, instrument};

use crate::api::models::users::CurrentUser;
use crate::db::models::groups::{MembershipDBResponse, StudyGroupCreateDBRequest, StudyGroupDBResponse};
use crate::db::models::join_requests::{JoinRequestCreateDBRequest, JoinRequestDBResponse, JoinRequestDecision};
use crate::errors::{Error, Result};
use crate::store::Store;
use crate::types::{
    DEFAULT_MEMBER_LIMIT, GroupId, JoinRequestId, JoinRequestStatus, MEMBER_LIMIT_OPTIONS, MembershipRole, Permission, UserId,
    abbrev_uuid, is_known_subject,
};

pub const MAX_GROUP_NAME_LENGTH: usize = 100;

/// What a user may do in a group, derived from the group and their membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupAccess {
    pub is_public: bool,
    pub is_member: bool,
    pub is_admin: bool,
    pub is_full: bool,
    pub has_pending_request: bool,
}

impl GroupAccess {
    pub fn derive(group: &StudyGroupDBResponse, membership: Option<&MembershipDBResponse>, has_pending_request: bool) -> Self {
        Self {
            is_public: group.is_public,
            is_member: membership.is_some(),
            is_admin: membership.is_some_and(|m| m.role == MembershipRole::Admin),
            is_full: group.is_full(),
            has_pending_request,
        }
    }

    /// Look up the user's membership and pending request for `group`.
    pub async fn load(store: &dyn Store, group: &StudyGroupDBResponse, user_id: UserId) -> Result<Self> {
        let membership = store.get_membership(group.id, user_id).await?;
        let has_pending_request = if membership.is_none() && !group.is_public {
            store.find_pending_join_request(group.id, user_id).await?.is_some()
        } else {
            false
        };
        Ok(Self::derive(group, membership.as_ref(), has_pending_request))
    }

    /// Public groups accept direct joins while they have room.
    pub fn can_join(&self) -> bool {
        self.is_public && !self.is_member && !self.is_full
    }

    /// Private groups accept one pending request per user.
    pub fn can_request(&self) -> bool {
        !self.is_public && !self.is_member && !self.has_pending_request
    }
}

/// Validated input for [`create_group`].
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub description: Option<String>,
    pub subject: String,
    pub is_public: Option<bool>,
    pub member_limit: Option<i32>,
}

pub async fn get_group(store: &dyn Store, group_id: GroupId) -> Result<StudyGroupDBResponse> {
    store
        .get_group(group_id)
        .await?
        .ok_or_else(|| Error::not_found("Study group", group_id))
}

#[instrument(skip(store, creator, new_group), fields(creator = %abbrev_uuid(&creator.id)), err)]
pub async fn create_group(store: &dyn Store, creator: &CurrentUser, new_group: NewGroup) -> Result<StudyGroupDBResponse> {
    if !creator.is_admin() {
        return Err(Error::forbidden(Permission::AppAdmin, "create", "study groups"));
    }

    let name = new_group.name.trim().to_string();
    if name.is_empty() {
        return Err(Error::bad_request("Group name is required"));
    }
    if name.chars().count() > MAX_GROUP_NAME_LENGTH {
        return Err(Error::bad_request(format!(
            "Group name must be at most {MAX_GROUP_NAME_LENGTH} characters"
        )));
    }
    if !is_known_subject(&new_group.subject) {
        return Err(Error::bad_request(format!("Unknown subject '{}'", new_group.subject)));
    }
    let member_limit = new_group.member_limit.unwrap_or(DEFAULT_MEMBER_LIMIT);
    if !MEMBER_LIMIT_OPTIONS.contains(&member_limit) {
        return Err(Error::bad_request(format!(
            "Member limit must be one of {MEMBER_LIMIT_OPTIONS:?}"
        )));
    }
    let description = new_group
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let group = store
        .create_group_with_admin(&StudyGroupCreateDBRequest {
            name,
            description,
            subject: new_group.subject,
            created_by: creator.id,
            is_public: new_group.is_public.unwrap_or(true),
            member_limit,
        })
        .await?;

    info!("Created study group {} ({})", group.name, abbrev_uuid(&group.id));
    Ok(group)
}

/// Join a public group directly.
#[instrument(skip(store, user_id, group_id), fields(user_id = %abbrev_uuid(&user_id), group_id = %abbrev_uuid(&group_id)), err)]
pub async fn join_group(store: &dyn Store, user_id: UserId, group_id: GroupId) -> Result<MembershipDBResponse> {
    let group = get_group(store, group_id).await?;
    if !group.is_public {
        return Err(Error::bad_request("This group is private. Send a join request instead"));
    }
    if store.get_membership(group_id, user_id).await?.is_some() {
        return Err(Error::conflict("You are already a member of this group"));
    }
    if group.is_full() {
        return Err(Error::conflict("This group is full"));
    }

    let membership = store.add_membership(group_id, user_id, MembershipRole::Member).await?;
    debug!("User joined group, {} of {} places were taken", group.member_count + 1, group.member_limit);
    Ok(membership)
}

/// Ask to join a private group.
#[instrument(skip(store, user_id, group_id, message), fields(user_id = %abbrev_uuid(&user_id), group_id = %abbrev_uuid(&group_id)), err)]
pub async fn request_to_join(
    store: &dyn Store,
    user_id: UserId,
    group_id: GroupId,
    message: Option<String>,
) -> Result<JoinRequestDBResponse> {
    let group = get_group(store, group_id).await?;
    if group.is_public {
        return Err(Error::bad_request("This group is public. Join it directly instead"));
    }
    if store.get_membership(group_id, user_id).await?.is_some() {
        return Err(Error::conflict("You are already a member of this group"));
    }
    if store.find_pending_join_request(group_id, user_id).await?.is_some() {
        return Err(Error::conflict("You already have a pending request for this group"));
    }

    let request = store
        .create_join_request(&JoinRequestCreateDBRequest {
            group_id,
            user_id,
            message: message.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()),
        })
        .await?;
    info!("Join request {} created", abbrev_uuid(&request.id));
    Ok(request)
}

async fn require_group_admin(store: &dyn Store, user_id: UserId, group_id: GroupId, action: &str) -> Result<()> {
    get_group(store, group_id).await?;
    match store.get_membership(group_id, user_id).await? {
        Some(membership) if membership.role == MembershipRole::Admin => Ok(()),
        _ => Err(Error::forbidden(Permission::GroupAdmin, action, "join requests")),
    }
}

/// Fail unless `user_id` belongs to the group.
pub async fn require_member(store: &dyn Store, user_id: UserId, group_id: GroupId, action: &str) -> Result<MembershipDBResponse> {
    get_group(store, group_id).await?;
    store
        .get_membership(group_id, user_id)
        .await?
        .ok_or_else(|| Error::forbidden(Permission::GroupMember, action, "group messages"))
}

pub async fn list_join_requests(
    store: &dyn Store,
    reviewer: UserId,
    group_id: GroupId,
    status: JoinRequestStatus,
) -> Result<Vec<JoinRequestDBResponse>> {
    require_group_admin(store, reviewer, group_id, "list").await?;
    Ok(store.list_join_requests(group_id, Some(status)).await?)
}

/// Approve or reject a pending request. Approval adds the requester as a
/// `member` without checking capacity.
#[instrument(skip(store, reviewer, group_id, request_id), fields(reviewer = %abbrev_uuid(&reviewer), request_id = %abbrev_uuid(&request_id)), err)]
pub async fn review_join_request(
    store: &dyn Store,
    reviewer: UserId,
    group_id: GroupId,
    request_id: JoinRequestId,
    decision: JoinRequestDecision,
) -> Result<JoinRequestDBResponse> {
    require_group_admin(store, reviewer, group_id, "review").await?;

    let request = store
        .get_join_request(request_id)
        .await?
        .filter(|r| r.group_id == group_id)
        .ok_or_else(|| Error::not_found("Join request", request_id))?;
    if request.status.is_terminal() {
        return Err(Error::conflict("This request has already been reviewed"));
    }

    let reviewed = store
        .review_join_request(request_id, reviewer, decision)
        .await?
        .ok_or_else(|| Error::conflict("This request has already been reviewed"))?;
    info!("Join request {} marked {:?}", abbrev_uuid(&request_id), reviewed.status);
    Ok(reviewed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::test_utils::InterleavingStore;
    use crate::types::AppRole;
    use tokio::sync::broadcast;

    fn store() -> InMemoryStore {
        let (events, _) = broadcast::channel(8);
        InMemoryStore::new(events)
    }

    fn app_admin(id: UserId) -> CurrentUser {
        CurrentUser {
            id,
            email: "admin@example.com".to_string(),
            roles: vec![AppRole::Admin, AppRole::User],
        }
    }

    fn new_group(name: &str, is_public: bool, member_limit: Option<i32>) -> NewGroup {
        NewGroup {
            name: name.to_string(),
            description: Some("   ".to_string()),
            subject: "Math".to_string(),
            is_public: Some(is_public),
            member_limit,
        }
    }

    #[tokio::test]
    async fn test_creator_becomes_admin_member() {
        let store = store();
        let admin = store.seed_user("admin@example.com").await;
        let group = create_group(&store, &app_admin(admin.id), new_group("Algebra", true, None)).await.unwrap();

        assert_eq!(group.member_count, 1);
        assert_eq!(group.member_limit, DEFAULT_MEMBER_LIMIT);
        assert_eq!(group.description, None);
        let membership = store.get_membership(group.id, admin.id).await.unwrap().unwrap();
        assert_eq!(membership.role, MembershipRole::Admin);
    }

    #[tokio::test]
    async fn test_create_group_validation() {
        let store = store();
        let admin = store.seed_user("admin@example.com").await;
        let creator = app_admin(admin.id);

        let plain = CurrentUser {
            roles: vec![AppRole::User],
            ..creator.clone()
        };
        let err = create_group(&store, &plain, new_group("Algebra", true, None)).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientPermissions { .. }));

        let err = create_group(&store, &creator, new_group("Algebra", true, Some(7))).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));

        let mut unknown = new_group("Algebra", true, None);
        unknown.subject = "Astrology".to_string();
        assert!(matches!(create_group(&store, &creator, unknown).await.unwrap_err(), Error::BadRequest { .. }));

        let err = create_group(&store, &creator, new_group("  ", true, None)).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }

    #[tokio::test]
    async fn test_join_rules() {
        let store = store();
        let admin = store.seed_user("admin@example.com").await;
        let alice = store.seed_user("alice@example.com").await;
        let bob = store.seed_user("bob@example.com").await;
        let group = store.seed_group(admin.id, "Tiny", true, 2).await;

        join_group(&store, alice.id, group.id).await.unwrap();
        let err = join_group(&store, alice.id, group.id).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));

        let err = join_group(&store, bob.id, group.id).await.unwrap_err();
        assert_eq!(err.user_message(), "This group is full");

        let private = store.seed_group(admin.id, "Private", false, 20).await;
        let err = join_group(&store, bob.id, private.id).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_joins_can_overshoot_limit() {
        let store = InterleavingStore::new();
        let admin = store.inner.seed_user("admin@example.com").await;
        let alice = store.inner.seed_user("alice@example.com").await;
        let bob = store.inner.seed_user("bob@example.com").await;
        // One place left: the creator holds the other
        let group = store.inner.seed_group(admin.id, "Pair", true, 2).await;

        let (first, second) = tokio::join!(
            join_group(&store, alice.id, group.id),
            join_group(&store, bob.id, group.id),
        );
        assert!(first.is_ok(), "{first:?}");
        assert!(second.is_ok(), "{second:?}");

        let after = get_group(&store, group.id).await.unwrap();
        assert_eq!(after.member_count, 3);
        assert!(after.is_full());

        // Once the count is visible the advisory check refuses
        let carol = store.inner.seed_user("carol@example.com").await;
        let err = join_group(&store, carol.id, group.id).await.unwrap_err();
        assert_eq!(err.user_message(), "This group is full");
    }

    #[tokio::test]
    async fn test_concurrent_approvals_at_capacity_both_succeed() {
        let store = InterleavingStore::new();
        let admin = store.inner.seed_user("admin@example.com").await;
        let group = store.inner.seed_group(admin.id, "Full house", false, 5).await;
        for i in 0..4 {
            let user = store.inner.seed_user(&format!("member{i}@example.com")).await;
            store.add_membership(group.id, user.id, MembershipRole::Member).await.unwrap();
        }
        let alice = store.inner.seed_user("alice@example.com").await;
        let bob = store.inner.seed_user("bob@example.com").await;
        let alice_request = request_to_join(&store, alice.id, group.id, None).await.unwrap();
        let bob_request = request_to_join(&store, bob.id, group.id, None).await.unwrap();
        assert_eq!(get_group(&store, group.id).await.unwrap().member_count, 5);

        let (first, second) = tokio::join!(
            review_join_request(&store, admin.id, group.id, alice_request.id, JoinRequestDecision::Approve),
            review_join_request(&store, admin.id, group.id, bob_request.id, JoinRequestDecision::Approve),
        );
        assert_eq!(first.unwrap().status, JoinRequestStatus::Approved);
        assert_eq!(second.unwrap().status, JoinRequestStatus::Approved);

        let after = get_group(&store, group.id).await.unwrap();
        assert_eq!(after.member_count, i64::from(after.member_limit) + 2);
        assert!(store.get_membership(group.id, alice.id).await.unwrap().is_some());
        assert!(store.get_membership(group.id, bob.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_request_and_review_workflow() {
        let store = store();
        let admin = store.seed_user("admin@example.com").await;
        let alice = store.seed_user("alice@example.com").await;
        let group = store.seed_group(admin.id, "Private", false, 5).await;

        let request = request_to_join(&store, alice.id, group.id, Some(" please ".to_string())).await.unwrap();
        assert_eq!(request.status, JoinRequestStatus::Pending);
        assert_eq!(request.message.as_deref(), Some("please"));

        let err = request_to_join(&store, alice.id, group.id, None).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));

        let access = GroupAccess::load(&store, &group, alice.id).await.unwrap();
        assert!(access.has_pending_request);
        assert!(!access.can_request());

        let err = review_join_request(&store, alice.id, group.id, request.id, JoinRequestDecision::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientPermissions { .. }));

        let pending = list_join_requests(&store, admin.id, group.id, JoinRequestStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);

        let reviewed = review_join_request(&store, admin.id, group.id, request.id, JoinRequestDecision::Approve)
            .await
            .unwrap();
        assert_eq!(reviewed.status, JoinRequestStatus::Approved);
        assert_eq!(reviewed.reviewed_by, Some(admin.id));
        assert!(store.get_membership(group.id, alice.id).await.unwrap().is_some());

        let err = review_join_request(&store, admin.id, group.id, request.id, JoinRequestDecision::Reject)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));

        let pending = list_join_requests(&store, admin.id, group.id, JoinRequestStatus::Pending).await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_rejection_allows_a_new_request() {
        let store = store();
        let admin = store.seed_user("admin@example.com").await;
        let alice = store.seed_user("alice@example.com").await;
        let group = store.seed_group(admin.id, "Private", false, 5).await;

        let request = request_to_join(&store, alice.id, group.id, None).await.unwrap();
        review_join_request(&store, admin.id, group.id, request.id, JoinRequestDecision::Reject)
            .await
            .unwrap();
        assert!(store.get_membership(group.id, alice.id).await.unwrap().is_none());

        request_to_join(&store, alice.id, group.id, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_approval_ignores_capacity() {
        let store = store();
        let admin = store.seed_user("admin@example.com").await;
        let alice = store.seed_user("alice@example.com").await;
        let group = store.seed_group(admin.id, "Solo", false, 5).await;
        for i in 0..4 {
            let user = store.seed_user(&format!("member{i}@example.com")).await;
            store.add_membership(group.id, user.id, MembershipRole::Member).await.unwrap();
        }

        let request = request_to_join(&store, alice.id, group.id, None).await.unwrap();
        assert!(get_group(&store, group.id).await.unwrap().is_full());
        review_join_request(&store, admin.id, group.id, request.id, JoinRequestDecision::Approve)
            .await
            .unwrap();
        assert_eq!(get_group(&store, group.id).await.unwrap().member_count, 6);
    }

    #[tokio::test]
    async fn test_request_from_other_group_is_not_found() {
        let store = store();
        let admin = store.seed_user("admin@example.com").await;
        let alice = store.seed_user("alice@example.com").await;
        let first = store.seed_group(admin.id, "First", false, 5).await;
        let second = store.seed_group(admin.id, "Second", false, 5).await;

        let request = request_to_join(&store, alice.id, first.id, None).await.unwrap();
        let err = review_join_request(&store, admin.id, second.id, request.id, JoinRequestDecision::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_access_flags() {
        let group = StudyGroupDBResponse {
            id: uuid::Uuid::new_v4(),
            name: "g".to_string(),
            description: None,
            subject: "Math".to_string(),
            created_by: uuid::Uuid::new_v4(),
            is_public: true,
            member_limit: 5,
            member_count: 5,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let access = GroupAccess::derive(&group, None, false);
        assert!(access.is_full);
        assert!(!access.can_join());
        assert!(!access.can_request());
    }
}
