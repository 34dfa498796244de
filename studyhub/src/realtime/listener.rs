//! Background task that turns Postgres `NOTIFY` events into [`MessageInserted`] broadcasts.

use std::time::Duration;

use sqlx::{PgPool, postgres::PgListener};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::{GROUP_MESSAGE_CHANNEL, MessageInserted};

/// Connection state of the listener, reported for observability and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerStatus {
    Connecting,
    Connected,
    Disconnected,
    Reconnecting,
}

pub struct MessageListener {
    db: PgPool,
    events: broadcast::Sender<MessageInserted>,
    reconnect_delay: Duration,
    status_tx: Option<tokio::sync::mpsc::Sender<ListenerStatus>>,
}

impl MessageListener {
    pub fn new(db: PgPool, events: broadcast::Sender<MessageInserted>, reconnect_delay: Duration) -> Self {
        Self {
            db,
            events,
            reconnect_delay,
            status_tx: None,
        }
    }

    /// Report connection state changes on the given channel.
    pub fn with_status(mut self, status_tx: tokio::sync::mpsc::Sender<ListenerStatus>) -> Self {
        self.status_tx = Some(status_tx);
        self
    }

    async fn report(&self, status: ListenerStatus) {
        if let Some(tx) = &self.status_tx
            && tx.send(status).await.is_err()
        {
            debug!("Listener status receiver dropped");
        }
    }

    /// Listen until cancelled, reconnecting after connection loss.
    #[instrument(skip(self, shutdown_token), err)]
    pub async fn run(self, shutdown_token: CancellationToken) -> anyhow::Result<()> {
        'outer: loop {
            self.report(ListenerStatus::Connecting).await;
            let mut listener = match PgListener::connect_with(&self.db).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!("Failed to connect chat listener: {}", e);
                    if self.wait_before_retry(&shutdown_token).await {
                        break 'outer;
                    }
                    continue;
                }
            };
            if let Err(e) = listener.listen(GROUP_MESSAGE_CHANNEL).await {
                error!("Failed to LISTEN on {}: {}", GROUP_MESSAGE_CHANNEL, e);
                if self.wait_before_retry(&shutdown_token).await {
                    break 'outer;
                }
                continue;
            }

            self.report(ListenerStatus::Connected).await;
            info!("Started chat message listener on channel {}", GROUP_MESSAGE_CHANNEL);

            loop {
                tokio::select! {
                    _ = shutdown_token.cancelled() => {
                        info!("Received shutdown signal, stopping chat message listener");
                        break 'outer;
                    }

                    notification_result = listener.try_recv() => {
                        match notification_result {
                            Ok(None) => {
                                warn!("Chat listener connection lost, reconnecting");
                                self.report(ListenerStatus::Disconnected).await;
                                self.report(ListenerStatus::Reconnecting).await;
                                break;
                            }
                            Ok(Some(notification)) => {
                                debug!("Received notification on channel: {} with payload: {:?}",
                                    notification.channel(), notification.payload());
                                match serde_json::from_str::<MessageInserted>(notification.payload()) {
                                    Ok(event) => {
                                        // No subscribers is not an error
                                        let receivers = self.events.send(event).unwrap_or(0);
                                        debug!("Forwarded message event to {} subscribers", receivers);
                                    }
                                    Err(e) => {
                                        warn!("Ignoring malformed chat notification {:?}: {}", notification.payload(), e);
                                    }
                                }
                            }
                            Err(e) => {
                                error!("Error receiving notification: {}", e);
                                self.report(ListenerStatus::Disconnected).await;
                                if self.wait_before_retry(&shutdown_token).await {
                                    break 'outer;
                                }
                                self.report(ListenerStatus::Reconnecting).await;
                                break;
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Sleep for the reconnect delay. Returns true if shutdown was requested meanwhile.
    async fn wait_before_retry(&self, shutdown_token: &CancellationToken) -> bool {
        tokio::select! {
            _ = shutdown_token.cancelled() => true,
            _ = tokio::time::sleep(self.reconnect_delay) => false,
        }
    }
}
