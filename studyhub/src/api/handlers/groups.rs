use std::collections::HashSet;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        groups::{
            GroupAccessResponse, GroupCreate, GroupDetailResponse, GroupResponse, JoinRequestCreate, JoinRequestResponse, JoinRequestReview,
            ListGroupsQuery, ListJoinRequestsQuery, MemberResponse, MembershipResponse,
        },
        users::CurrentUser,
    },
    db::models::groups::GroupFilter,
    errors::{Error, Result},
    services::groups::{self, GroupAccess, NewGroup},
    types::{GroupId, JoinRequestId, JoinRequestStatus},
};

/// List public study groups
#[utoipa::path(
    get,
    path = "/groups",
    tag = "groups",
    summary = "List study groups",
    description = "Public groups only, newest first. `search` matches name and description case-insensitively; `subject` is exact.",
    params(ListGroupsQuery),
    responses(
        (status = 200, description = "Study groups", body = [GroupResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_groups(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListGroupsQuery>,
) -> Result<Json<Vec<GroupResponse>>> {
    let filter = GroupFilter::new(query.search, query.subject);
    let groups = state.store.list_groups(&filter).await?;
    let my_groups: HashSet<GroupId> = state
        .store
        .list_user_memberships(current_user.id)
        .await?
        .into_iter()
        .map(|m| m.group_id)
        .collect();

    Ok(Json(
        groups
            .into_iter()
            .map(|group| {
                let is_member = my_groups.contains(&group.id);
                GroupResponse::new(group, is_member)
            })
            .collect(),
    ))
}

/// Create a study group
#[utoipa::path(
    post,
    path = "/groups",
    tag = "groups",
    summary = "Create study group",
    description = "Platform admins only. The creator becomes the group's first admin member.",
    request_body = GroupCreate,
    responses(
        (status = 201, description = "Group created", body = GroupResponse),
        (status = 400, description = "Invalid name, subject or member limit"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not a platform admin"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_group(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<GroupCreate>,
) -> Result<(StatusCode, Json<GroupResponse>)> {
    let group = groups::create_group(
        state.store.as_ref(),
        &current_user,
        NewGroup {
            name: create.name,
            description: create.description,
            subject: create.subject,
            is_public: create.is_public,
            member_limit: create.member_limit,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(GroupResponse::new(group, true))))
}

/// Get a study group with its members and the caller's access
#[utoipa::path(
    get,
    path = "/groups/{id}",
    tag = "groups",
    summary = "Get study group",
    params(("id" = uuid::Uuid, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Group detail", body = GroupDetailResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Group not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_group(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<GroupId>,
) -> Result<Json<GroupDetailResponse>> {
    let group = groups::get_group(state.store.as_ref(), id).await?;
    let access = GroupAccess::load(state.store.as_ref(), &group, current_user.id).await?;
    let members = state.store.list_members(id).await?;

    Ok(Json(GroupDetailResponse {
        group: GroupResponse::new(group, access.is_member),
        members: members.into_iter().map(MemberResponse::from).collect(),
        access: GroupAccessResponse::from(access),
    }))
}

/// List a group's members
#[utoipa::path(
    get,
    path = "/groups/{id}/members",
    tag = "groups",
    summary = "List group members",
    params(("id" = uuid::Uuid, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Members in join order", body = [MemberResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Group not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_members(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<GroupId>,
) -> Result<Json<Vec<MemberResponse>>> {
    groups::get_group(state.store.as_ref(), id).await?;
    let members = state.store.list_members(id).await?;
    Ok(Json(members.into_iter().map(MemberResponse::from).collect()))
}

/// Join a public group
#[utoipa::path(
    post,
    path = "/groups/{id}/join",
    tag = "groups",
    summary = "Join study group",
    params(("id" = uuid::Uuid, Path, description = "Group ID")),
    responses(
        (status = 201, description = "Joined", body = MembershipResponse),
        (status = 400, description = "Group is private"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Group not found"),
        (status = 409, description = "Already a member, or the group is full"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn join_group(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<GroupId>,
) -> Result<(StatusCode, Json<MembershipResponse>)> {
    let membership = groups::join_group(state.store.as_ref(), current_user.id, id).await?;
    Ok((StatusCode::CREATED, Json(membership.into())))
}

/// Ask to join a private group
#[utoipa::path(
    post,
    path = "/groups/{id}/join-requests",
    tag = "groups",
    summary = "Request to join",
    request_body(content = JoinRequestCreate, description = "Optional note for the group admins"),
    params(("id" = uuid::Uuid, Path, description = "Group ID")),
    responses(
        (status = 201, description = "Request created", body = JoinRequestResponse),
        (status = 400, description = "Group is public"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Group not found"),
        (status = 409, description = "Already a member, or a request is already pending"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_join_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<GroupId>,
    body: Option<Json<JoinRequestCreate>>,
) -> Result<(StatusCode, Json<JoinRequestResponse>)> {
    let Json(create) = body.unwrap_or_default();
    let request = groups::request_to_join(state.store.as_ref(), current_user.id, id, create.message).await?;
    Ok((StatusCode::CREATED, Json(request.into())))
}

/// List a group's join requests
#[utoipa::path(
    get,
    path = "/groups/{id}/join-requests",
    tag = "groups",
    summary = "List join requests",
    description = "Group admins only. Defaults to pending requests.",
    params(("id" = uuid::Uuid, Path, description = "Group ID"), ListJoinRequestsQuery),
    responses(
        (status = 200, description = "Join requests, oldest first", body = [JoinRequestResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not a group admin"),
        (status = 404, description = "Group not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_join_requests(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<GroupId>,
    Query(query): Query<ListJoinRequestsQuery>,
) -> Result<Json<Vec<JoinRequestResponse>>> {
    let status = query.status.unwrap_or(JoinRequestStatus::Pending);
    let requests = groups::list_join_requests(state.store.as_ref(), current_user.id, id, status).await?;
    Ok(Json(requests.into_iter().map(JoinRequestResponse::from).collect()))
}

/// Approve or reject a join request
#[utoipa::path(
    patch,
    path = "/groups/{id}/join-requests/{request_id}",
    tag = "groups",
    summary = "Review join request",
    description = "Group admins only. Approval adds the requester as a member without a capacity check.",
    request_body = JoinRequestReview,
    params(
        ("id" = uuid::Uuid, Path, description = "Group ID"),
        ("request_id" = uuid::Uuid, Path, description = "Join request ID"),
    ),
    responses(
        (status = 200, description = "Request reviewed", body = JoinRequestResponse),
        (status = 400, description = "Status is not approved or rejected"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not a group admin"),
        (status = 404, description = "Group or request not found"),
        (status = 409, description = "Request was already reviewed"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn review_join_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((id, request_id)): Path<(GroupId, JoinRequestId)>,
    Json(review): Json<JoinRequestReview>,
) -> Result<Json<JoinRequestResponse>> {
    let decision = review
        .decision()
        .ok_or_else(|| Error::bad_request("status must be approved or rejected"))?;
    let reviewed = groups::review_join_request(state.store.as_ref(), current_user.id, id, request_id, decision).await?;
    Ok(Json(reviewed.into()))
}
