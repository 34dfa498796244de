use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};

use crate::{
    AppState,
    api::models::{
        messages::{MessageCreate, MessageResponse},
        users::CurrentUser,
    },
    db::models::messages::MessageCreateDBRequest,
    errors::{Error, Result},
    realtime::{ChatTimeline, group_message_stream},
    services::groups,
    types::{GroupId, abbrev_uuid},
};

/// SSE event name carrying a [`MessageResponse`].
pub const MESSAGE_EVENT: &str = "message";

/// List a group's chat messages
#[utoipa::path(
    get,
    path = "/groups/{id}/messages",
    tag = "messages",
    summary = "List group messages",
    description = "Members only. Oldest first.",
    params(("id" = uuid::Uuid, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Messages", body = [MessageResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not a member"),
        (status = 404, description = "Group not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_messages(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<GroupId>,
) -> Result<Json<Vec<MessageResponse>>> {
    groups::require_member(state.store.as_ref(), current_user.id, id, "read").await?;
    let timeline = ChatTimeline::from_messages(state.store.list_messages(id).await?);
    Ok(Json(timeline.into_messages().into_iter().map(MessageResponse::from).collect()))
}

/// Send a chat message
#[utoipa::path(
    post,
    path = "/groups/{id}/messages",
    tag = "messages",
    summary = "Send group message",
    description = "Members only. Stream subscribers receive the message through the realtime channel.",
    request_body = MessageCreate,
    params(("id" = uuid::Uuid, Path, description = "Group ID")),
    responses(
        (status = 201, description = "Message stored", body = MessageResponse),
        (status = 400, description = "Empty content"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not a member"),
        (status = 404, description = "Group not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_message(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<GroupId>,
    Json(create): Json<MessageCreate>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let content = create.content.trim();
    if content.is_empty() {
        return Err(Error::bad_request("Message cannot be empty"));
    }
    groups::require_member(state.store.as_ref(), current_user.id, id, "send").await?;

    let message = state
        .store
        .create_message(&MessageCreateDBRequest {
            group_id: id,
            user_id: current_user.id,
            content: content.to_string(),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(message.into())))
}

/// Stream new chat messages
#[utoipa::path(
    get,
    path = "/groups/{id}/messages/stream",
    tag = "messages",
    summary = "Stream group messages",
    description = "Members only. Server-Sent Events with one `message` event per new message in the group.",
    params(("id" = uuid::Uuid, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not a member"),
        (status = 404, description = "Group not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn stream_messages(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<GroupId>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>>> {
    groups::require_member(state.store.as_ref(), current_user.id, id, "stream").await?;

    // Subscribe after the check, so a refused caller never holds a receiver
    let receiver = state.message_events.subscribe();
    tracing::debug!("Chat stream opened for group {}", abbrev_uuid(&id));

    let stream = group_message_stream(state.store.clone(), receiver, id, state.shutdown_token.clone())
        .map(|message| Event::default().event(MESSAGE_EVENT).json_data(MessageResponse::from(message)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
