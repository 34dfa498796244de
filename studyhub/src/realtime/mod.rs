//! Realtime delivery of group chat messages.
//!
//! The pipeline is:
//!
//! ```text
//! INSERT group_messages ──NOTIFY──▶ MessageListener ──broadcast──▶ subscriber
//!                                  (one per process)                │
//!                                                   filter by group_id
//!                                                                   │
//!                                                   Store::get_message(id)
//!                                                                   │
//!                                                   ChatTimeline::merge
//! ```
//!
//! Notifications only carry identifiers; every subscriber re-fetches the row
//! (with author names) before merging it. The in-memory store publishes to the
//! same broadcast channel directly.

use std::collections::HashSet;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::db::models::messages::MessageDBResponse;
use crate::store::SharedStore;
use crate::types::{GroupId, MessageId, abbrev_uuid};

pub mod listener;

pub use listener::MessageListener;

/// Postgres notification channel fired by the `group_messages` insert trigger.
pub const GROUP_MESSAGE_CHANNEL: &str = "group_message_inserted";

/// Payload of a `group_message_inserted` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInserted {
    pub id: MessageId,
    pub group_id: GroupId,
}

/// Sender side of the process-wide message event channel.
pub type MessageEvents = broadcast::Sender<MessageInserted>;

/// An ordered, de-duplicated view of one group's chat.
///
/// Messages are kept sorted by `(created_at, id)`. Merging an id that is
/// already present is a no-op, so duplicate deliveries and the overlap between
/// the initial fetch and the live stream are harmless.
#[derive(Debug, Default)]
pub struct ChatTimeline {
    messages: Vec<MessageDBResponse>,
    seen: HashSet<MessageId>,
}

impl ChatTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a timeline from an initial fetch, in any order.
    pub fn from_messages(messages: impl IntoIterator<Item = MessageDBResponse>) -> Self {
        let mut timeline = Self::new();
        for message in messages {
            timeline.merge(message);
        }
        timeline
    }

    /// Insert a message at its ordered position. Returns false if it was already present.
    pub fn merge(&mut self, message: MessageDBResponse) -> bool {
        if !self.seen.insert(message.id) {
            trace!("Skipping duplicate message {}", abbrev_uuid(&message.id));
            return false;
        }
        let key = (message.created_at, message.id);
        let position = self.messages.partition_point(|m| (m.created_at, m.id) <= key);
        self.messages.insert(position, message);
        true
    }

    pub fn messages(&self) -> &[MessageDBResponse] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<MessageDBResponse> {
        self.messages
    }
}

/// Turn the raw event channel into a stream of fully loaded messages for one group.
///
/// Events for other groups are dropped before any fetch. Each matching event is
/// re-fetched through the store; rows that have vanished or fail to load are
/// skipped with a warning. Ids already delivered on this stream are skipped.
///
/// The stream ends once `shutdown` is cancelled, even though the sender side
/// of the channel lives as long as the server.
pub fn group_message_stream(
    store: SharedStore,
    receiver: broadcast::Receiver<MessageInserted>,
    group_id: GroupId,
    shutdown: CancellationToken,
) -> impl Stream<Item = MessageDBResponse> + Send + 'static {
    let mut delivered: HashSet<MessageId> = HashSet::new();

    BroadcastStream::new(receiver)
        .filter_map(move |event| {
            let store = store.clone();
            async move {
                let event = match event {
                    Ok(event) => event,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!("Chat subscriber for group {} lagged, {} events dropped", abbrev_uuid(&group_id), skipped);
                        return None;
                    }
                };
                if event.group_id != group_id {
                    return None;
                }
                match store.get_message(event.id).await {
                    Ok(Some(message)) => Some(message),
                    Ok(None) => {
                        warn!("Message {} was notified but not found", abbrev_uuid(&event.id));
                        None
                    }
                    Err(e) => {
                        warn!("Failed to fetch notified message {}: {}", abbrev_uuid(&event.id), e);
                        None
                    }
                }
            }
        })
        .filter(move |message| std::future::ready(delivered.insert(message.id)))
        .take_until(shutdown.cancelled_owned())
}
