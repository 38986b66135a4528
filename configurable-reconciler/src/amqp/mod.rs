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

//! AMQP 1.0 transport built on `fe2o3-amqp`.
//!
//! Endpoints without TLS material use a plain connection with `ANONYMOUS`
//! SASL. With a certificate directory the connection runs over mutual TLS and
//! authenticates with `EXTERNAL`.

mod sasl;
mod tls;

use async_trait::async_trait;
use broker_reconciler::transport::{
    Connection, Connector, Endpoint, LinkListener, LinkSender, ReceiverSource, SaslMechanism,
    TransportError, TransportMessage, TransportOptions,
};
use fe2o3_amqp::connection::ConnectionHandle;
use fe2o3_amqp::sasl_profile::SaslProfile;
use fe2o3_amqp::session::SessionHandle;
use fe2o3_amqp::types::messaging::{
    AmqpValue, ApplicationProperties, Body, Message, MessageId, Properties, Source,
};
use fe2o3_amqp::types::primitives::{SimpleValue, Value};
use fe2o3_amqp::{Connection as AmqpConnectionBuilder, Delivery, Receiver, Sender, Session};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use sasl::SaslError;
pub use tls::TlsSetupError;

const COMPONENT: &str = "amqp_transport";

/// Opens one AMQP connection and session per [`Connector::connect`] call.
pub struct AmqpConnector {
    container_prefix: String,
}

impl AmqpConnector {
    pub fn new(container_prefix: &str) -> Self {
        Self {
            container_prefix: container_prefix.to_string(),
        }
    }
}

impl Default for AmqpConnector {
    fn default() -> Self {
        Self::new("broker-reconciler")
    }
}

#[async_trait]
impl Connector for AmqpConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        options: &TransportOptions,
    ) -> Result<Arc<dyn Connection>, TransportError> {
        let refused = |reason: String| TransportError::Connect {
            endpoint: endpoint.to_string(),
            reason,
        };
        let container_id = format!("{}-{}", self.container_prefix, Uuid::new_v4());
        let builder = AmqpConnectionBuilder::builder()
            .container_id(container_id)
            .hostname(endpoint.host.as_str());

        let opened = match &options.tls {
            None => {
                if !options.sasl_mechanisms.contains(&SaslMechanism::Anonymous) {
                    return Err(refused(format!(
                        "plain connections need ANONYMOUS, configured {:?}",
                        options.sasl_mechanisms
                    )));
                }
                let url = format!("amqp://{}:{}", endpoint.host, endpoint.port);
                builder
                    .sasl_profile(SaslProfile::Anonymous)
                    .open(url.as_str())
                    .await
            }
            Some(tls_options) => {
                if !options.sasl_mechanisms.contains(&SaslMechanism::External) {
                    return Err(refused(format!(
                        "mutual TLS needs EXTERNAL, configured {:?}",
                        options.sasl_mechanisms
                    )));
                }
                let stream = tls::connect(endpoint, tls_options, options.verify_hostname)
                    .await
                    .map_err(|err| refused(err.to_string()))?;
                let stream = sasl::negotiate_external(stream, &endpoint.host)
                    .await
                    .map_err(|err| refused(err.to_string()))?;
                builder.scheme("amqp").open_with_stream(stream).await
            }
        };
        let mut connection = opened.map_err(|err| refused(err.to_string()))?;

        let session = match Session::begin(&mut connection).await {
            Ok(session) => session,
            Err(err) => {
                let _ = connection.close().await;
                return Err(refused(err.to_string()));
            }
        };
        debug!(
            component = COMPONENT,
            endpoint = %endpoint,
            tls = options.tls.is_some(),
            "amqp connection opened"
        );

        let peer = endpoint.to_string();
        let closed = Arc::new(watch::channel(false).0);
        let release = Arc::new(Notify::new());
        let supervisor = tokio::spawn(supervise(
            connection,
            peer.clone(),
            closed.clone(),
            release.clone(),
        ));

        Ok(Arc::new(AmqpConnection {
            peer,
            session: Mutex::new(session),
            closed,
            release,
            supervisor: Mutex::new(Some(supervisor)),
            next_link: AtomicU32::new(0),
        }))
    }
}

/// Owns the connection handle. Marks the connection closed when the engine
/// stops on its own, or closes it once the local side is done with it.
async fn supervise(
    mut connection: ConnectionHandle<()>,
    peer: String,
    closed: Arc<watch::Sender<bool>>,
    release: Arc<Notify>,
) {
    let ended = tokio::select! {
        outcome = connection.on_close() => Some(outcome),
        _ = release.notified() => None,
    };
    match ended {
        Some(outcome) => {
            closed.send_replace(true);
            match outcome {
                Ok(()) => info!(component = COMPONENT, peer = %peer, "peer closed amqp connection"),
                Err(err) => warn!(
                    component = COMPONENT,
                    peer = %peer,
                    error = %err,
                    "amqp connection ended"
                ),
            }
        }
        None => {
            if let Err(err) = connection.close().await {
                debug!(component = COMPONENT, peer = %peer, error = %err, "error closing connection");
            }
        }
    }
}

struct AmqpConnection {
    peer: String,
    session: Mutex<SessionHandle<()>>,
    closed: Arc<watch::Sender<bool>>,
    release: Arc<Notify>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    next_link: AtomicU32,
}

impl AmqpConnection {
    fn link_name(&self, role: &str) -> String {
        let id = self.next_link.fetch_add(1, Ordering::Relaxed);
        format!("{role}-{id}")
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

#[async_trait]
impl Connection for AmqpConnection {
    fn remote_container(&self) -> String {
        self.peer.clone()
    }

    async fn open_sender(&self, address: &str) -> Result<Arc<dyn LinkSender>, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut session = self.session.lock().await;
        let sender = Sender::attach(&mut *session, self.link_name("sender"), address)
            .await
            .map_err(|err| TransportError::Attach {
                address: address.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Arc::new(AmqpSender {
            address: address.to_string(),
            sender: Mutex::new(sender),
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
        let attach_error = |reason: String| TransportError::Attach {
            address: source.to_string(),
            reason,
        };

        let mut session = self.session.lock().await;
        let name = self.link_name("receiver");
        let receiver = match &source {
            ReceiverSource::Address(address) => {
                Receiver::attach(&mut *session, name, address.as_str()).await
            }
            ReceiverSource::Dynamic => {
                Receiver::builder()
                    .name(name)
                    .source(Source::builder().dynamic(true).build())
                    .attach(&mut *session)
                    .await
            }
        }
        .map_err(|err| attach_error(err.to_string()))?;
        drop(session);

        let address = match &source {
            ReceiverSource::Address(address) => address.clone(),
            ReceiverSource::Dynamic => receiver
                .source()
                .as_ref()
                .and_then(|source| source.address.clone())
                .ok_or_else(|| attach_error("peer did not assign an address".to_string()))?,
        };

        tokio::spawn(pump_receiver(
            receiver,
            address.clone(),
            listener,
            self.closed.subscribe(),
        ));
        Ok(address)
    }

    async fn closed(&self) {
        let mut closed = self.closed.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    async fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        if let Err(err) = self.session.lock().await.end().await {
            debug!(component = COMPONENT, peer = %self.peer, error = %err, "error ending session");
        }
        self.release.notify_one();
        if let Some(supervisor) = self.supervisor.lock().await.take() {
            if let Err(err) = supervisor.await {
                warn!(component = COMPONENT, peer = %self.peer, error = %err, "connection supervisor ended abnormally");
            }
        }
    }
}

/// Feeds deliveries from one receiver link into its listener until the
/// connection closes or the link fails.
async fn pump_receiver(
    mut receiver: Receiver,
    address: String,
    listener: Arc<dyn LinkListener>,
    mut closed: watch::Receiver<bool>,
) {
    loop {
        let delivery = tokio::select! {
            _ = closed.wait_for(|closed| *closed) => break,
            delivery = receiver.recv::<Body<Value>>() => delivery,
        };
        match delivery {
            Ok(delivery) => {
                if let Err(err) = receiver.accept(&delivery).await {
                    warn!(component = COMPONENT, address = %address, error = %err, "unable to accept delivery");
                }
                listener.on_receive(to_transport_message(&delivery)).await;
            }
            Err(err) => {
                listener.on_detach(Some(err.to_string())).await;
                return;
            }
        }
    }
    let _ = receiver.close().await;
}

fn message_id_string(id: &MessageId) -> String {
    match id {
        MessageId::String(value) => value.clone(),
        MessageId::Ulong(value) => value.to_string(),
        other => format!("{other:?}"),
    }
}

fn to_transport_message(delivery: &Delivery<Body<Value>>) -> TransportMessage {
    let message = delivery.message();
    let properties = message.properties.as_ref();
    let application_properties = message
        .application_properties
        .as_ref()
        .map(|properties| {
            properties
                .0
                .iter()
                .filter_map(|(key, value)| match value {
                    SimpleValue::String(value) => Some((key.clone(), value.clone())),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    let body = match &message.body {
        Body::Value(AmqpValue(Value::String(body))) => Some(body.clone()),
        _ => None,
    };

    TransportMessage {
        message_id: properties
            .and_then(|properties| properties.message_id.as_ref())
            .map(message_id_string),
        correlation_id: properties
            .and_then(|properties| properties.correlation_id.as_ref())
            .map(message_id_string),
        reply_to: properties.and_then(|properties| properties.reply_to.clone()),
        application_properties,
        body,
    }
}

struct AmqpSender {
    address: String,
    sender: Mutex<Sender>,
}

#[async_trait]
impl LinkSender for AmqpSender {
    async fn send(&self, message: TransportMessage) -> Result<(), TransportError> {
        let mut properties = Properties::builder();
        if let Some(message_id) = message.message_id {
            properties = properties.message_id(message_id);
        }
        if let Some(correlation_id) = message.correlation_id {
            properties = properties.correlation_id(correlation_id);
        }
        if let Some(reply_to) = message.reply_to {
            properties = properties.reply_to(reply_to);
        }

        let mut application_properties = ApplicationProperties::builder();
        for (key, value) in message.application_properties {
            application_properties = application_properties.insert(key, value);
        }

        let amqp_message = Message::builder()
            .properties(properties.build())
            .application_properties(application_properties.build())
            .value(message.body.unwrap_or_default())
            .build();

        self.sender
            .lock()
            .await
            .send(amqp_message)
            .await
            .map_err(|err| TransportError::Send {
                address: self.address.clone(),
                reason: err.to_string(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::tls::tests::TestCa;
    use super::AmqpConnector;
    use broker_reconciler::transport::{
        Connection, Connector, Endpoint, TransportError, TransportOptions,
    };
    use fe2o3_amqp::acceptor::{ConnectionAcceptor, SaslAnonymousMechanism, SessionAcceptor};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    async fn local_listener() -> (TcpListener, Endpoint) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, Endpoint::new("127.0.0.1", port))
    }

    async fn connect(
        endpoint: &Endpoint,
        options: &TransportOptions,
    ) -> Result<Arc<dyn Connection>, TransportError> {
        AmqpConnector::default().connect(endpoint, options).await
    }

    #[tokio::test]
    async fn broker_hanging_up_resolves_closed() {
        let (listener, endpoint) = local_listener().await;
        let (hang_up, hang_up_rx) = oneshot::channel::<()>();
        let broker = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let acceptor = ConnectionAcceptor::builder()
                .container_id("fake-broker")
                .sasl_acceptor(SaslAnonymousMechanism::new())
                .build();
            let mut connection = acceptor.accept(stream).await.unwrap();
            let _session = SessionAcceptor::new().accept(&mut connection).await.unwrap();
            let _ = hang_up_rx.await;
            let _ = connection.close().await;
        });

        let connection = connect(&endpoint, &TransportOptions::default()).await.unwrap();
        assert_eq!(connection.remote_container(), endpoint.to_string());
        let still_open = tokio::time::timeout(Duration::from_millis(100), connection.closed()).await;
        assert!(still_open.is_err());

        hang_up.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), connection.closed())
            .await
            .expect("peer close must resolve closed()");
        assert!(matches!(
            connection.open_sender("activemq.management").await,
            Err(TransportError::Closed)
        ));
        connection.close().await;
        broker.await.unwrap();
    }

    #[tokio::test]
    async fn cert_dir_options_start_a_tls_handshake() {
        let dir = tempfile::tempdir().unwrap();
        let options = TestCa::new().write_cert_dir(dir.path());
        let (listener, endpoint) = local_listener().await;
        let (first_byte, first_byte_rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut byte = [0u8; 1];
            stream.read_exact(&mut byte).await.unwrap();
            let _ = first_byte.send(byte[0]);
        });

        let result = connect(&endpoint, &options).await;

        // 0x16 opens a TLS handshake record, i.e. the ClientHello.
        assert_eq!(first_byte_rx.await.unwrap(), 0x16);
        match result {
            Err(TransportError::Connect { reason, .. }) => {
                assert!(reason.contains("handshake"), "{reason}")
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("a peer that never answers the handshake cannot connect"),
        }
    }

    #[tokio::test]
    async fn tls_without_external_is_refused_before_dialling() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = TestCa::new().write_cert_dir(dir.path());
        options.sasl_mechanisms.clear();

        let result = connect(&Endpoint::new("127.0.0.1", 1), &options).await;

        match result {
            Err(TransportError::Connect { reason, .. }) => assert!(reason.contains("EXTERNAL")),
            _ => panic!("expected the connect to be refused"),
        }
    }
}
