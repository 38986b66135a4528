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

use broker_reconciler::management::{
    ATTRIBUTE_PROPERTY, OPERATION_NAME_PROPERTY, RESOURCE_NAME_PROPERTY,
};
use broker_reconciler::transport::TransportMessage;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Clone, Debug, Default)]
struct QueueModel {
    address: String,
    paused: bool,
    message_count: i64,
}

#[derive(Clone, Debug)]
struct DivertModel {
    routing_name: String,
    address: String,
    forwarding_address: String,
}

#[derive(Default)]
struct BrokerModel {
    queues: BTreeMap<String, QueueModel>,
    diverts: BTreeMap<String, DivertModel>,
    connector_services: BTreeMap<String, Value>,
    temp_queues: BTreeSet<String>,
    mutations: Vec<String>,
    next_temp_queue: u32,
    silent: bool,
    failed_over: bool,
}

/// In-memory broker answering the management protocol.
#[derive(Clone, Default)]
pub struct FakeBroker {
    model: Arc<Mutex<BrokerModel>>,
}

fn string_param(params: &[Value], index: usize) -> String {
    params
        .get(index)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl FakeBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_queues(queues: &[&str]) -> Self {
        let broker = Self::new();
        {
            let mut model = broker.model.lock().unwrap();
            for queue in queues {
                model.queues.insert(
                    queue.to_string(),
                    QueueModel {
                        address: queue.to_string(),
                        ..Default::default()
                    },
                );
            }
        }
        broker
    }

    pub fn with_divert(self, name: &str, address: &str, forwarding_address: &str) -> Self {
        self.model.lock().unwrap().diverts.insert(
            name.to_string(),
            DivertModel {
                routing_name: name.to_string(),
                address: address.to_string(),
                forwarding_address: forwarding_address.to_string(),
            },
        );
        self
    }

    /// Stops answering requests, so callers run into their deadline.
    pub fn set_silent(&self, silent: bool) {
        self.model.lock().unwrap().silent = silent;
    }

    pub fn queue_names(&self) -> BTreeSet<String> {
        self.model.lock().unwrap().queues.keys().cloned().collect()
    }

    pub fn divert_names(&self) -> BTreeSet<String> {
        self.model.lock().unwrap().diverts.keys().cloned().collect()
    }

    pub fn is_paused(&self, queue: &str) -> bool {
        self.model
            .lock()
            .unwrap()
            .queues
            .get(queue)
            .map(|queue| queue.paused)
            .unwrap_or(false)
    }

    pub fn has_failed_over(&self) -> bool {
        self.model.lock().unwrap().failed_over
    }

    /// State-changing operations in the order the broker executed them,
    /// e.g. `deployQueue(q1)`.
    pub fn mutations(&self) -> Vec<String> {
        self.model.lock().unwrap().mutations.clone()
    }

    /// Allocates the address of a dynamic reply receiver.
    pub(crate) fn create_temp_queue(&self) -> String {
        let mut model = self.model.lock().unwrap();
        model.next_temp_queue += 1;
        let name = format!("activemq.management.tmp.{}", model.next_temp_queue);
        model.temp_queues.insert(name.clone());
        name
    }

    pub(crate) fn delete_temp_queue(&self, name: &str) {
        self.model.lock().unwrap().temp_queues.remove(name);
    }

    /// Executes a management request and builds the reply, if the broker answers.
    pub(crate) fn handle(&self, request: &TransportMessage) -> Option<TransportMessage> {
        let mut model = self.model.lock().unwrap();
        if model.silent {
            return None;
        }

        let resource = request
            .application_property(RESOURCE_NAME_PROPERTY)
            .unwrap_or_default();
        let member = request
            .application_property(OPERATION_NAME_PROPERTY)
            .or_else(|| request.application_property(ATTRIBUTE_PROPERTY))
            .unwrap_or_default();
        let params: Vec<Value> = request
            .body
            .as_deref()
            .and_then(|body| serde_json::from_str(body).ok())
            .unwrap_or_default();
        debug!(resource, member, ?params, "fake broker handling request");

        let (kind, object) = resource.split_once('.').unwrap_or((resource, ""));
        let body = match (kind, member) {
            ("broker", "getQueueNames") => {
                let names: Vec<&String> =
                    model.queues.keys().chain(model.temp_queues.iter()).collect();
                json!([names])
            }
            ("broker", "getDivertNames") => {
                let names: Vec<&String> = model.diverts.keys().collect();
                json!([names])
            }
            ("broker", "deployQueue") => {
                let address = string_param(&params, 0);
                let name = string_param(&params, 1);
                model.mutations.push(format!("deployQueue({name})"));
                model.queues.entry(name).or_insert(QueueModel {
                    address,
                    ..Default::default()
                });
                Value::Null
            }
            ("broker", "destroyQueue") => {
                let name = string_param(&params, 0);
                model.mutations.push(format!("destroyQueue({name})"));
                model.queues.remove(&name);
                Value::Null
            }
            ("broker", "createDivert") => {
                let name = string_param(&params, 0);
                model.mutations.push(format!("createDivert({name})"));
                let divert = DivertModel {
                    routing_name: string_param(&params, 1),
                    address: string_param(&params, 2),
                    forwarding_address: string_param(&params, 3),
                };
                model.diverts.insert(name, divert);
                Value::Null
            }
            ("broker", "destroyDivert") => {
                let name = string_param(&params, 0);
                model.mutations.push(format!("destroyDivert({name})"));
                model.diverts.remove(&name);
                Value::Null
            }
            ("broker", "createConnectorService") => {
                let name = string_param(&params, 0);
                model.mutations.push(format!("createConnectorService({name})"));
                let connection_params = params.get(2).cloned().unwrap_or(Value::Null);
                model.connector_services.insert(name, connection_params);
                Value::Null
            }
            ("broker", "destroyConnectorService") => {
                let name = string_param(&params, 0);
                model.mutations.push(format!("destroyConnectorService({name})"));
                model.connector_services.remove(&name);
                Value::Null
            }
            ("broker", "forceFailover") => {
                model.mutations.push("forceFailover()".to_string());
                model.failed_over = true;
                Value::Null
            }
            ("queue", "pause") | ("queue", "resume") => {
                model.mutations.push(format!("{member}({object})"));
                if let Some(queue) = model.queues.get_mut(object) {
                    queue.paused = member == "pause";
                }
                Value::Null
            }
            ("queue", "messageCount") => model
                .queues
                .get(object)
                .map(|queue| json!([queue.message_count]))
                .unwrap_or(Value::Null),
            ("queue", "getAddress") => model
                .queues
                .get(object)
                .map(|queue| json!([queue.address]))
                .unwrap_or(Value::Null),
            ("divert", _) => {
                let Some(divert) = model.diverts.get(object) else {
                    return Some(reply_to(request, Value::Null));
                };
                match member {
                    "getRoutingName" => json!([divert.routing_name]),
                    "getAddress" => json!([divert.address]),
                    "getForwardingAddress" => json!([divert.forwarding_address]),
                    _ => Value::Null,
                }
            }
            _ => Value::Null,
        };
        Some(reply_to(request, body))
    }
}

fn reply_to(request: &TransportMessage, body: Value) -> TransportMessage {
    TransportMessage {
        correlation_id: request.message_id.clone(),
        body: Some(body.to_string()),
        ..Default::default()
    }
}
