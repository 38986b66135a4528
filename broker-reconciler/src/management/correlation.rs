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

//! Reply correlation table shared between the reply link and calling tasks.

use crate::observability::events;
use crate::transport::{LinkListener, TransportMessage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, warn};

const COMPONENT: &str = "management_correlation";

type PendingReplies = HashMap<String, oneshot::Sender<TransportMessage>>;

#[derive(Default)]
pub(crate) struct CorrelationTable {
    pending: Mutex<PendingReplies>,
}

impl CorrelationTable {
    fn pending(&self) -> MutexGuard<'_, PendingReplies> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserves a slot for `request_id`. The slot is released when the returned
    /// handle is dropped, whether or not a reply arrived.
    pub(crate) fn register(self: &Arc<Self>, request_id: &str) -> PendingReply {
        let (tx, rx) = oneshot::channel();
        self.pending().insert(request_id.to_string(), tx);
        PendingReply {
            request_id: request_id.to_string(),
            table: self.clone(),
            receiver: rx,
        }
    }

    /// Hands `reply` to its waiter. Returns `false` when nobody is waiting.
    pub(crate) fn complete(&self, reply: TransportMessage) -> bool {
        let Some(correlation_id) = reply.correlation_id.clone() else {
            return false;
        };
        let Some(waiter) = self.pending().remove(&correlation_id) else {
            return false;
        };
        waiter.send(reply).is_ok()
    }

    /// Drops every waiter; their calls observe a closed channel.
    pub(crate) fn fail_all(&self) {
        self.pending().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.pending().len()
    }

    fn release(&self, request_id: &str) {
        self.pending().remove(request_id);
    }
}

pub(crate) struct PendingReply {
    request_id: String,
    table: Arc<CorrelationTable>,
    receiver: oneshot::Receiver<TransportMessage>,
}

impl PendingReply {
    pub(crate) async fn wait(&mut self) -> Result<TransportMessage, oneshot::error::RecvError> {
        (&mut self.receiver).await
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.table.release(&self.request_id);
    }
}

/// Receiver-link listener that feeds the correlation table.
pub(crate) struct ReplyListener {
    broker: String,
    table: Arc<CorrelationTable>,
}

impl ReplyListener {
    pub(crate) fn new(broker: &str, table: Arc<CorrelationTable>) -> Self {
        Self {
            broker: broker.to_string(),
            table,
        }
    }
}

#[async_trait]
impl LinkListener for ReplyListener {
    async fn on_receive(&self, message: TransportMessage) {
        let correlation_id = message.correlation_id.clone();
        if self.table.complete(message) {
            debug!(
                component = COMPONENT,
                broker = %self.broker,
                correlation_id = ?correlation_id,
                "reply matched"
            );
        } else {
            warn!(
                event = events::MANAGEMENT_REPLY_UNMATCHED,
                component = COMPONENT,
                broker = %self.broker,
                correlation_id = ?correlation_id,
                "discarding reply without a waiting request"
            );
        }
    }

    async fn on_detach(&self, reason: Option<String>) {
        warn!(
            event = events::MANAGEMENT_REPLY_LINK_DETACHED,
            component = COMPONENT,
            broker = %self.broker,
            reason = ?reason,
            pending = self.table.len(),
            "reply link detached, failing pending requests"
        );
        self.table.fail_all();
    }
}
