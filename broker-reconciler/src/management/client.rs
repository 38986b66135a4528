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

use crate::management::correlation::{CorrelationTable, ReplyListener};
use crate::management::link_setup::{with_retries, RetryPolicy};
use crate::management::{ManagementError, ManagementRequest, ManagementResponse, MANAGEMENT_ADDRESS};
use crate::observability::events;
use crate::transport::{
    Connection, Connector, Endpoint, LinkSender, ReceiverSource, TransportOptions,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

const COMPONENT: &str = "management_client";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Request/response client for one broker's management address.
pub struct ManagementClient {
    broker_id: String,
    connection: Arc<dyn Connection>,
    sender: Arc<dyn LinkSender>,
    reply_to: String,
    correlation: Arc<CorrelationTable>,
    default_timeout: Duration,
    closed: AtomicBool,
}

impl ManagementClient {
    /// Connects to `endpoint` and attaches the management links with the default retry bound.
    pub async fn connect(
        connector: &dyn Connector,
        endpoint: &Endpoint,
        options: &TransportOptions,
    ) -> Result<Self, ManagementError> {
        Self::connect_with_policy(connector, endpoint, options, RetryPolicy::default()).await
    }

    pub async fn connect_with_policy(
        connector: &dyn Connector,
        endpoint: &Endpoint,
        options: &TransportOptions,
        policy: RetryPolicy,
    ) -> Result<Self, ManagementError> {
        let connection = connector
            .connect(endpoint, options)
            .await
            .map_err(|cause| ManagementError::Connection {
                endpoint: endpoint.to_string(),
                cause,
            })?;

        match Self::from_connection(connection.clone(), policy).await {
            Ok(client) => Ok(client),
            Err(err) => {
                connection.close().await;
                Err(err)
            }
        }
    }

    /// Attaches the management sender, then the dynamic reply receiver, on an
    /// already open connection.
    pub async fn from_connection(
        connection: Arc<dyn Connection>,
        policy: RetryPolicy,
    ) -> Result<Self, ManagementError> {
        let broker_id = connection.remote_container();
        let link_error = |cause| ManagementError::Connection {
            endpoint: broker_id.clone(),
            cause,
        };

        let sender = with_retries(policy, &broker_id, "sender", || {
            connection.open_sender(MANAGEMENT_ADDRESS)
        })
        .await
        .map_err(link_error)?;

        let correlation = Arc::new(CorrelationTable::default());
        let listener = Arc::new(ReplyListener::new(&broker_id, correlation.clone()));
        let reply_to = with_retries(policy, &broker_id, "receiver", || {
            connection.open_receiver(ReceiverSource::Dynamic, listener.clone())
        })
        .await
        .map_err(link_error)?;

        info!(
            event = events::MANAGEMENT_CONNECTED,
            component = COMPONENT,
            broker = %broker_id,
            reply_to = %reply_to,
            "management links attached"
        );

        Ok(Self {
            broker_id,
            connection,
            sender,
            reply_to,
            correlation,
            default_timeout: DEFAULT_REQUEST_TIMEOUT,
            closed: AtomicBool::new(false),
        })
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn broker_id(&self) -> &str {
        &self.broker_id
    }

    /// Broker-assigned address replies arrive on.
    pub fn reply_to(&self) -> &str {
        &self.reply_to
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn invoke_operation(
        &self,
        resource: &str,
        operation: &str,
        params: Vec<Value>,
    ) -> Result<ManagementResponse, ManagementError> {
        self.request(
            ManagementRequest::operation(resource, operation, params),
            self.default_timeout,
        )
        .await
    }

    pub async fn invoke_operation_with_timeout(
        &self,
        resource: &str,
        operation: &str,
        params: Vec<Value>,
        timeout: Duration,
    ) -> Result<ManagementResponse, ManagementError> {
        self.request(
            ManagementRequest::operation(resource, operation, params),
            timeout,
        )
        .await
    }

    pub async fn invoke_attribute(
        &self,
        resource: &str,
        attribute: &str,
        params: Vec<Value>,
    ) -> Result<ManagementResponse, ManagementError> {
        self.request(
            ManagementRequest::attribute(resource, attribute, params),
            self.default_timeout,
        )
        .await
    }

    /// Sends `request` and waits up to `timeout` for the reply correlated to it.
    pub async fn request(
        &self,
        request: ManagementRequest,
        timeout: Duration,
    ) -> Result<ManagementResponse, ManagementError> {
        if self.is_closed() {
            return Err(self.closed_error());
        }

        let target = request.target();
        let request_id = Uuid::new_v4().to_string();
        let mut pending = self.correlation.register(&request_id);

        debug!(
            event = events::MANAGEMENT_REQUEST,
            component = COMPONENT,
            broker = %self.broker_id,
            target = %target,
            request_id = %request_id,
            params = %request.encoded_params(),
            "sending management request"
        );

        self.sender
            .send(request.to_message(&request_id, &self.reply_to))
            .await
            .map_err(|cause| ManagementError::Send {
                broker: self.broker_id.clone(),
                target: target.clone(),
                cause,
            })?;

        match tokio::time::timeout(timeout, pending.wait()).await {
            Ok(Ok(reply)) => ManagementResponse::from_reply(&self.broker_id, &target, &reply),
            Ok(Err(_)) => Err(self.closed_error()),
            Err(_) => {
                warn!(
                    event = events::MANAGEMENT_TIMEOUT,
                    component = COMPONENT,
                    broker = %self.broker_id,
                    target = %target,
                    timeout_ms = timeout.as_millis() as u64,
                    "no reply from broker within deadline"
                );
                Err(ManagementError::Timeout {
                    broker: self.broker_id.clone(),
                    target,
                    params: request.encoded_params(),
                })
            }
        }
    }

    fn closed_error(&self) -> ManagementError {
        ManagementError::Closed {
            broker: self.broker_id.clone(),
        }
    }

    /// Releases the connection. Outstanding calls fail with `Closed` instead of
    /// waiting for their deadline.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(
            event = events::MANAGEMENT_CLOSED,
            component = COMPONENT,
            broker = %self.broker_id,
            "closing management connection"
        );
        self.correlation.fail_all();
        self.connection.close().await;
    }
}
