/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Connection lifecycle for the address configuration feed.

use crate::config_stream::decode::{decode_address_config, DecodeError};
use crate::model::ClusterGroups;
use crate::observability::{events, fields};
use crate::transport::{
    Connection, Connector, Endpoint, LinkListener, ReceiverSource, TransportMessage,
    TransportOptions,
};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const COMPONENT: &str = "config_stream";

/// Well-known address the configuration service publishes snapshots on.
pub const FEED_ADDRESS: &str = "v1/addresses";

pub const RECONNECT_DELAY: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

impl Display for ListenerState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ListenerState::Disconnected => "disconnected",
            ListenerState::Connecting => "connecting",
            ListenerState::Open => "open",
            ListenerState::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Receives every complete desired-state snapshot decoded from the feed.
#[async_trait]
pub trait AddressConfigListener: Send + Sync {
    async fn addresses_changed(&self, groups: ClusterGroups);
}

/// Handle to the task that keeps the configuration feed subscribed.
pub struct ConfigStreamListener {
    state: watch::Receiver<ListenerState>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    latest: Arc<ArcSwapOption<ClusterGroups>>,
}

impl ConfigStreamListener {
    /// Spawns the feed task; it connects immediately and keeps reconnecting
    /// every [`RECONNECT_DELAY`] until [`stop`](Self::stop) is called.
    pub fn start(
        connector: Arc<dyn Connector>,
        endpoint: Endpoint,
        options: TransportOptions,
        sink: Arc<dyn AddressConfigListener>,
    ) -> Self {
        let (state_tx, state) = watch::channel(ListenerState::Disconnected);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let latest = Arc::new(ArcSwapOption::empty());

        let feed = FeedTask {
            connector,
            endpoint,
            options,
            sink,
            latest: latest.clone(),
            state: state_tx,
        };
        let task = tokio::spawn(feed.run(shutdown_rx));

        Self {
            state,
            shutdown,
            task: Mutex::new(Some(task)),
            latest,
        }
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ListenerState> {
        self.state.clone()
    }

    /// Last snapshot handed to the sink, if any arrived yet.
    pub fn latest_snapshot(&self) -> Option<Arc<ClusterGroups>> {
        self.latest.load_full()
    }

    /// Closes the feed connection and waits for the task to finish.
    pub async fn stop(&self) {
        let Some(task) = self.task.lock().await.take() else {
            return;
        };
        self.shutdown.send_replace(true);
        if let Err(err) = task.await {
            warn!(component = COMPONENT, error = %err, "config stream task ended abnormally");
        }
    }
}

struct FeedTask {
    connector: Arc<dyn Connector>,
    endpoint: Endpoint,
    options: TransportOptions,
    sink: Arc<dyn AddressConfigListener>,
    latest: Arc<ArcSwapOption<ClusterGroups>>,
    state: watch::Sender<ListenerState>,
}

/// Why an open feed connection ended.
enum Disconnect {
    Shutdown,
    ConnectionClosed,
    ReceiverDetached,
}

impl FeedTask {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            self.transition(ListenerState::Connecting);
            let connected = tokio::select! {
                _ = stop_requested(&mut shutdown) => break,
                connected = self.open_feed() => connected,
            };

            if let Some((connection, detached)) = connected {
                self.transition(ListenerState::Open);
                let disconnect = tokio::select! {
                    _ = stop_requested(&mut shutdown) => Disconnect::Shutdown,
                    _ = connection.closed() => Disconnect::ConnectionClosed,
                    _ = detached.notified() => Disconnect::ReceiverDetached,
                };

                match disconnect {
                    Disconnect::Shutdown => {
                        self.transition(ListenerState::Closing);
                        connection.close().await;
                        break;
                    }
                    Disconnect::ConnectionClosed => {
                        warn!(
                            component = COMPONENT,
                            endpoint = %self.endpoint,
                            "configuration service closed the connection"
                        );
                    }
                    Disconnect::ReceiverDetached => {
                        connection.close().await;
                    }
                }
            }

            self.transition(ListenerState::Disconnected);
            info!(
                event = events::CONFIG_RECONNECT_SCHEDULED,
                component = COMPONENT,
                endpoint = %self.endpoint,
                delay_ms = RECONNECT_DELAY.as_millis() as u64,
                "reconnecting to configuration service"
            );
            tokio::select! {
                _ = stop_requested(&mut shutdown) => break,
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
        self.transition(ListenerState::Disconnected);
    }

    /// Connects and subscribes to the feed. The returned `Notify` fires when
    /// the receiver link is detached by the peer.
    async fn open_feed(&self) -> Option<(Arc<dyn Connection>, Arc<Notify>)> {
        let connection = match self.connector.connect(&self.endpoint, &self.options).await {
            Ok(connection) => connection,
            Err(err) => {
                warn!(
                    event = events::CONFIG_CONNECT_FAILED,
                    component = COMPONENT,
                    endpoint = %self.endpoint,
                    error = %err,
                    "error connecting to configuration service"
                );
                return None;
            }
        };
        info!(
            component = COMPONENT,
            endpoint = %self.endpoint,
            "connected to the configuration service"
        );

        let detached = Arc::new(Notify::new());
        let receiver = Arc::new(FeedReceiver {
            sink: self.sink.clone(),
            latest: self.latest.clone(),
            detached: detached.clone(),
        });
        match connection
            .open_receiver(ReceiverSource::Address(FEED_ADDRESS.to_string()), receiver)
            .await
        {
            Ok(_) => Some((connection, detached)),
            Err(err) => {
                warn!(
                    event = events::CONFIG_CONNECT_FAILED,
                    component = COMPONENT,
                    endpoint = %self.endpoint,
                    error = %err,
                    "unable to subscribe to address feed"
                );
                connection.close().await;
                None
            }
        }
    }

    fn transition(&self, next: ListenerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(
                event = events::CONFIG_STATE_CHANGED,
                component = COMPONENT,
                from = %previous,
                to = %next,
                "config stream state changed"
            );
        }
    }
}

async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    // A dropped handle counts as a stop request.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

struct FeedReceiver {
    sink: Arc<dyn AddressConfigListener>,
    latest: Arc<ArcSwapOption<ClusterGroups>>,
    detached: Arc<Notify>,
}

impl FeedReceiver {
    fn decode(message: &TransportMessage) -> Result<ClusterGroups, DecodeError> {
        match message.body.as_deref() {
            Some(payload) => decode_address_config(payload),
            None => Err(DecodeError {
                payload: String::new(),
                reason: "message has no value body".to_string(),
            }),
        }
    }
}

#[async_trait]
impl LinkListener for FeedReceiver {
    async fn on_receive(&self, message: TransportMessage) {
        let groups = match Self::decode(&message) {
            Ok(groups) => groups,
            Err(err) => {
                warn!(
                    event = events::CONFIG_DECODE_FAILED,
                    component = COMPONENT,
                    error = %err,
                    "dropping undecodable address config"
                );
                return;
            }
        };

        info!(
            event = events::CONFIG_SNAPSHOT_DELIVERED,
            component = COMPONENT,
            clusters = %fields::format_cluster_groups(&groups),
            "decoded address config"
        );
        self.latest.store(Some(Arc::new(groups.clone())));
        self.sink.addresses_changed(groups).await;
    }

    async fn on_detach(&self, reason: Option<String>) {
        warn!(
            component = COMPONENT,
            reason = reason.as_deref().unwrap_or("none"),
            "address feed receiver detached"
        );
        self.detached.notify_one();
    }
}
