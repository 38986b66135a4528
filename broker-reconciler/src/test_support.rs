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

//! Recording transports shared by unit tests.

use crate::management::{ATTRIBUTE_PROPERTY, OPERATION_NAME_PROPERTY};
use crate::transport::{
    Connection, Connector, Endpoint, LinkListener, LinkSender, ReceiverSource, TransportError,
    TransportMessage, TransportOptions,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

const REPLY_ADDRESS: &str = "activemq.management.tmp.reply-0";

#[derive(Clone, Copy)]
enum ReplyMode {
    Silent,
    Scripted,
    EchoParams,
}

struct BrokerState {
    mode: ReplyMode,
    default_body: String,
    bodies: HashMap<String, String>,
    delay: Duration,
}

/// Broker side of a management link: answers requests on the reply listener.
#[derive(Clone)]
pub(crate) struct EchoBroker {
    state: Arc<Mutex<BrokerState>>,
    requests: Arc<Mutex<Vec<TransportMessage>>>,
}

impl EchoBroker {
    fn with_mode(mode: ReplyMode, default_body: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                mode,
                default_body: default_body.to_string(),
                bodies: HashMap::new(),
                delay: Duration::ZERO,
            })),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn silent() -> Self {
        Self::with_mode(ReplyMode::Silent, "")
    }

    pub(crate) fn replying(body: &str) -> Self {
        Self::with_mode(ReplyMode::Scripted, body)
    }

    pub(crate) fn echo_params() -> Self {
        Self::with_mode(ReplyMode::EchoParams, "")
    }

    pub(crate) fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(delay);
        self
    }

    /// Reply body for requests naming `member` as operation or attribute.
    pub(crate) fn with_reply(self, member: &str, body: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .bodies
            .insert(member.to_string(), body.to_string());
        self
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = delay;
    }

    pub(crate) fn set_reply_body(&self, body: &str) {
        self.state.lock().unwrap().default_body = body.to_string();
    }

    pub(crate) fn requests(&self) -> Vec<TransportMessage> {
        self.requests.lock().unwrap().clone()
    }

    fn reply_for(&self, request: &TransportMessage) -> Option<(TransportMessage, Duration)> {
        let state = self.state.lock().unwrap();
        let body = match state.mode {
            ReplyMode::Silent => return None,
            ReplyMode::EchoParams => request.body.clone().unwrap_or_default(),
            ReplyMode::Scripted => {
                let member = request
                    .application_property(OPERATION_NAME_PROPERTY)
                    .or_else(|| request.application_property(ATTRIBUTE_PROPERTY))
                    .unwrap_or_default();
                state
                    .bodies
                    .get(member)
                    .cloned()
                    .unwrap_or_else(|| state.default_body.clone())
            }
        };
        let reply = TransportMessage {
            correlation_id: request.message_id.clone(),
            body: Some(body),
            ..Default::default()
        };
        Some((reply, state.delay))
    }
}

struct ConnectionState {
    sender_failures: VecDeque<()>,
    receiver_failures: VecDeque<()>,
    sender_attempts: u32,
    receiver_attempts: u32,
    sender_addresses: Vec<String>,
    receivers: Vec<(ReceiverSource, Arc<dyn LinkListener>)>,
    close_calls: u32,
}

pub(crate) struct MockConnection {
    container: String,
    broker: EchoBroker,
    state: Arc<Mutex<ConnectionState>>,
    closed: watch::Sender<bool>,
}

impl MockConnection {
    pub(crate) fn new(container: &str, broker: EchoBroker) -> Arc<Self> {
        Arc::new(Self {
            container: container.to_string(),
            broker,
            state: Arc::new(Mutex::new(ConnectionState {
                sender_failures: VecDeque::new(),
                receiver_failures: VecDeque::new(),
                sender_attempts: 0,
                receiver_attempts: 0,
                sender_addresses: Vec::new(),
                receivers: Vec::new(),
                close_calls: 0,
            })),
            closed: watch::channel(false).0,
        })
    }

    pub(crate) fn fail_sender_attaches(&self, count: usize) {
        self.state.lock().unwrap().sender_failures = std::iter::repeat(()).take(count).collect();
    }

    pub(crate) fn fail_receiver_attaches(&self, count: usize) {
        self.state.lock().unwrap().receiver_failures = std::iter::repeat(()).take(count).collect();
    }

    pub(crate) fn sender_attach_attempts(&self) -> u32 {
        self.state.lock().unwrap().sender_attempts
    }

    pub(crate) fn receiver_attach_attempts(&self) -> u32 {
        self.state.lock().unwrap().receiver_attempts
    }

    pub(crate) fn sender_addresses(&self) -> Vec<String> {
        self.state.lock().unwrap().sender_addresses.clone()
    }

    pub(crate) fn receiver_sources(&self) -> Vec<ReceiverSource> {
        self.state
            .lock()
            .unwrap()
            .receivers
            .iter()
            .map(|(source, _)| source.clone())
            .collect()
    }

    pub(crate) fn reply_address(&self) -> &'static str {
        REPLY_ADDRESS
    }

    pub(crate) fn close_calls(&self) -> u32 {
        self.state.lock().unwrap().close_calls
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.close_calls() > 0
    }

    fn listeners(&self) -> Vec<Arc<dyn LinkListener>> {
        self.state
            .lock()
            .unwrap()
            .receivers
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    /// Delivers `body` to every attached receiver, as the peer would.
    pub(crate) async fn deliver(&self, body: &str) {
        for listener in self.listeners() {
            listener
                .on_receive(TransportMessage {
                    body: Some(body.to_string()),
                    ..Default::default()
                })
                .await;
        }
    }

    pub(crate) async fn detach_receivers(&self, reason: &str) {
        for listener in self.listeners() {
            listener.on_detach(Some(reason.to_string())).await;
        }
    }

    /// Simulates the peer dropping the connection.
    pub(crate) fn drop_connection(&self) {
        self.closed.send_replace(true);
    }
}

struct MockSender {
    connection: Arc<MockConnection>,
}

#[async_trait]
impl LinkSender for MockSender {
    async fn send(&self, message: TransportMessage) -> Result<(), TransportError> {
        let broker = &self.connection.broker;
        broker.requests.lock().unwrap().push(message.clone());
        let Some((reply, delay)) = broker.reply_for(&message) else {
            return Ok(());
        };
        let listeners = self.connection.listeners();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            for listener in listeners {
                listener.on_receive(reply.clone()).await;
            }
        });
        Ok(())
    }
}

/// Arc-wrapped so senders can refer back to the connection's listeners.
pub(crate) struct SharedConnection(pub(crate) Arc<MockConnection>);

#[async_trait]
impl Connection for SharedConnection {
    fn remote_container(&self) -> String {
        self.0.container.clone()
    }

    async fn open_sender(&self, address: &str) -> Result<Arc<dyn LinkSender>, TransportError> {
        let mut state = self.0.state.lock().unwrap();
        state.sender_attempts += 1;
        if state.sender_failures.pop_front().is_some() {
            return Err(TransportError::Attach {
                address: address.to_string(),
                reason: format!("sender attach failure {}", state.sender_attempts),
            });
        }
        state.sender_addresses.push(address.to_string());
        Ok(Arc::new(MockSender {
            connection: self.0.clone(),
        }))
    }

    async fn open_receiver(
        &self,
        source: ReceiverSource,
        listener: Arc<dyn LinkListener>,
    ) -> Result<String, TransportError> {
        let mut state = self.0.state.lock().unwrap();
        state.receiver_attempts += 1;
        if state.receiver_failures.pop_front().is_some() {
            return Err(TransportError::Attach {
                address: source.to_string(),
                reason: format!("receiver attach failure {}", state.receiver_attempts),
            });
        }
        let resolved = match &source {
            ReceiverSource::Address(address) => address.clone(),
            ReceiverSource::Dynamic => REPLY_ADDRESS.to_string(),
        };
        state.receivers.push((source, listener));
        Ok(resolved)
    }

    async fn closed(&self) {
        let mut closed = self.0.closed.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    async fn close(&self) {
        self.0.state.lock().unwrap().close_calls += 1;
        self.0.closed.send_replace(true);
    }
}

struct ConnectorState {
    connections: VecDeque<Result<Arc<MockConnection>, TransportError>>,
    attempts: Vec<tokio::time::Instant>,
}

/// Hands out scripted connection outcomes in order; once the script runs
/// out, every further attempt is refused.
#[derive(Clone)]
pub(crate) struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    pub(crate) fn scripted(
        outcomes: Vec<Result<Arc<MockConnection>, TransportError>>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(ConnectorState {
                connections: outcomes.into(),
                attempts: Vec::new(),
            })),
        }
    }

    pub(crate) fn new(connection: Arc<MockConnection>) -> Self {
        Self::scripted(vec![Ok(connection)])
    }

    pub(crate) fn unreachable() -> Self {
        Self::scripted(vec![])
    }

    pub(crate) fn attempts(&self) -> Vec<tokio::time::Instant> {
        self.state.lock().unwrap().attempts.clone()
    }
}

pub(crate) fn refused(endpoint: &Endpoint) -> TransportError {
    TransportError::Connect {
        endpoint: endpoint.to_string(),
        reason: "connection refused".to_string(),
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        _options: &TransportOptions,
    ) -> Result<Arc<dyn Connection>, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.attempts.push(tokio::time::Instant::now());
        match state.connections.pop_front() {
            Some(Ok(connection)) => Ok(Arc::new(SharedConnection(connection))),
            Some(Err(err)) => Err(err),
            None => Err(refused(endpoint)),
        }
    }
}
