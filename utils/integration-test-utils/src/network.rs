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

use crate::fake_broker::FakeBroker;
use async_trait::async_trait;
use broker_reconciler::management::MANAGEMENT_ADDRESS;
use broker_reconciler::transport::{
    Connection, Connector, Endpoint, LinkListener, LinkSender, ReceiverSource, TransportError,
    TransportMessage, TransportOptions,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Clone)]
enum Peer {
    Broker(FakeBroker),
    ConfigService(FakeConfigService),
}

/// Address feed publisher. Every live connection that subscribed receives
/// each published payload.
#[derive(Clone, Default)]
pub struct FakeConfigService {
    connections: Arc<Mutex<Vec<FakeConnection>>>,
    unavailable: Arc<Mutex<bool>>,
}

impl FakeConfigService {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_connections(&self) -> Vec<FakeConnection> {
        let mut connections = self.connections.lock().unwrap();
        connections.retain(|connection| !connection.is_closed());
        connections.clone()
    }

    pub async fn publish(&self, payload: &str) {
        for connection in self.live_connections() {
            for listener in connection.listeners() {
                listener
                    .on_receive(TransportMessage {
                        body: Some(payload.to_string()),
                        ..Default::default()
                    })
                    .await;
            }
        }
    }

    /// Refuses new connections while `true`.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    /// Closes every open connection from the service side.
    pub fn drop_connections(&self) {
        for connection in self.live_connections() {
            connection.core.closed.send_replace(true);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.live_connections()
            .iter()
            .map(|connection| connection.listeners().len())
            .sum()
    }
}

/// Routes connections by host name to fake brokers and config services.
#[derive(Clone, Default)]
pub struct FakeNetwork {
    peers: Arc<Mutex<HashMap<String, Peer>>>,
    attempts: Arc<Mutex<Vec<(String, Instant)>>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_broker(&self, host: &str, broker: FakeBroker) {
        self.peers
            .lock()
            .unwrap()
            .insert(host.to_string(), Peer::Broker(broker));
    }

    pub fn add_config_service(&self, host: &str, service: FakeConfigService) {
        self.peers
            .lock()
            .unwrap()
            .insert(host.to_string(), Peer::ConfigService(service));
    }

    /// When each connection attempt to `host` was made.
    pub fn connect_attempts(&self, host: &str) -> Vec<Instant> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(attempted, _)| attempted == host)
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl Connector for FakeNetwork {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        _options: &TransportOptions,
    ) -> Result<Arc<dyn Connection>, TransportError> {
        self.attempts
            .lock()
            .unwrap()
            .push((endpoint.host.clone(), Instant::now()));

        let refused = |reason: &str| TransportError::Connect {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        };
        let peer = self
            .peers
            .lock()
            .unwrap()
            .get(&endpoint.host)
            .cloned()
            .ok_or_else(|| refused("no route to host"))?;

        let connection = FakeConnection::new(&endpoint.host, peer.clone());
        if let Peer::ConfigService(service) = peer {
            if *service.unavailable.lock().unwrap() {
                return Err(refused("connection refused"));
            }
            service.connections.lock().unwrap().push(connection.clone());
        }
        Ok(Arc::new(connection))
    }
}

struct ConnectionCore {
    container: String,
    peer: Peer,
    receivers: Mutex<Vec<(String, Arc<dyn LinkListener>)>>,
    closed: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct FakeConnection {
    core: Arc<ConnectionCore>,
}

impl FakeConnection {
    fn new(container: &str, peer: Peer) -> Self {
        Self {
            core: Arc::new(ConnectionCore {
                container: container.to_string(),
                peer,
                receivers: Mutex::new(Vec::new()),
                closed: watch::channel(false).0,
            }),
        }
    }

    fn is_closed(&self) -> bool {
        *self.core.closed.borrow()
    }

    fn listeners(&self) -> Vec<Arc<dyn LinkListener>> {
        self.core
            .receivers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    fn listener_for(&self, address: &str) -> Option<Arc<dyn LinkListener>> {
        self.core
            .receivers
            .lock()
            .unwrap()
            .iter()
            .find(|(attached, _)| attached == address)
            .map(|(_, listener)| listener.clone())
    }
}

struct FakeSender {
    connection: FakeConnection,
    address: String,
}

#[async_trait]
impl LinkSender for FakeSender {
    async fn send(&self, message: TransportMessage) -> Result<(), TransportError> {
        if self.connection.is_closed() {
            return Err(TransportError::Closed);
        }
        let Peer::Broker(broker) = &self.connection.core.peer else {
            return Ok(());
        };
        if self.address != MANAGEMENT_ADDRESS {
            return Ok(());
        }

        let Some(reply) = broker.handle(&message) else {
            return Ok(());
        };
        let listener = message
            .reply_to
            .as_deref()
            .and_then(|reply_to| self.connection.listener_for(reply_to));
        if let Some(listener) = listener {
            tokio::spawn(async move { listener.on_receive(reply).await });
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for FakeConnection {
    fn remote_container(&self) -> String {
        self.core.container.clone()
    }

    async fn open_sender(&self, address: &str) -> Result<Arc<dyn LinkSender>, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        Ok(Arc::new(FakeSender {
            connection: self.clone(),
            address: address.to_string(),
        }))
    }

    async fn open_receiver(
        &self,
        source: ReceiverSource,
        listener: Arc<dyn LinkListener>,
    ) -> Result<String, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let address = match (&source, &self.core.peer) {
            (ReceiverSource::Address(address), _) => address.clone(),
            (ReceiverSource::Dynamic, Peer::Broker(broker)) => broker.create_temp_queue(),
            (ReceiverSource::Dynamic, Peer::ConfigService(_)) => {
                return Err(TransportError::Attach {
                    address: source.to_string(),
                    reason: "dynamic sources not supported".to_string(),
                })
            }
        };
        self.core
            .receivers
            .lock()
            .unwrap()
            .push((address.clone(), listener));
        Ok(address)
    }

    async fn closed(&self) {
        let mut closed = self.core.closed.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    async fn close(&self) {
        if self.core.closed.send_replace(true) {
            return;
        }
        if let Peer::Broker(broker) = &self.core.peer {
            for (address, _) in self.core.receivers.lock().unwrap().iter() {
                broker.delete_temp_queue(address);
            }
        }
    }
}
