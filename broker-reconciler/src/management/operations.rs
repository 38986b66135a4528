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

//! Broker-level operations expressed as management invocations.

use crate::management::{ManagementClient, ManagementError};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::info;

const COMPONENT: &str = "broker_operations";

const BROKER_RESOURCE: &str = "broker";

pub const AMQP_CONNECTOR_SERVICE_FACTORY: &str =
    "org.apache.activemq.artemis.integration.amqp.AMQPConnectorServiceFactory";

pub const FAILOVER_TIMEOUT: Duration = Duration::from_secs(10);

fn queue_resource(queue_name: &str) -> String {
    format!("queue.{queue_name}")
}

fn divert_resource(divert_name: &str) -> String {
    format!("divert.{divert_name}")
}

/// Administrative surface of one broker.
#[async_trait]
pub trait BrokerOperations: Send + Sync {
    /// Identifies the broker in diagnostics.
    fn broker_id(&self) -> String;

    async fn deploy_queue(&self, name: &str, address: &str) -> Result<(), ManagementError>;

    async fn destroy_queue(&self, name: &str) -> Result<(), ManagementError>;

    async fn pause_queue(&self, name: &str) -> Result<(), ManagementError>;

    async fn resume_queue(&self, name: &str) -> Result<(), ManagementError>;

    async fn create_connector_service(
        &self,
        name: &str,
        connection_params: &BTreeMap<String, String>,
    ) -> Result<(), ManagementError>;

    async fn destroy_connector_service(&self, name: &str) -> Result<(), ManagementError>;

    async fn create_divert(
        &self,
        name: &str,
        routing_name: &str,
        address: &str,
        forwarding_address: &str,
    ) -> Result<(), ManagementError>;

    async fn destroy_divert(&self, name: &str) -> Result<(), ManagementError>;

    /// Names of the broker's queues, without the client's own reply queue.
    async fn get_queue_names(&self) -> Result<BTreeSet<String>, ManagementError>;

    async fn get_num_queues(&self) -> Result<usize, ManagementError> {
        Ok(self.get_queue_names().await?.len())
    }

    async fn get_divert_names(&self) -> Result<BTreeSet<String>, ManagementError>;

    async fn get_queue_message_count(&self, queue_name: &str) -> Result<i64, ManagementError>;

    async fn get_queue_address(&self, queue_name: &str) -> Result<String, ManagementError>;

    async fn get_divert_routing_name(&self, divert_name: &str) -> Result<String, ManagementError>;

    async fn get_divert_address(&self, divert_name: &str) -> Result<String, ManagementError>;

    async fn get_divert_forwarding_address(
        &self,
        divert_name: &str,
    ) -> Result<String, ManagementError>;

    /// Asks the broker to fail over to its backup and stop.
    async fn force_shutdown(&self) -> Result<(), ManagementError>;

    async fn close(&self);
}

#[async_trait]
impl BrokerOperations for ManagementClient {
    fn broker_id(&self) -> String {
        ManagementClient::broker_id(self).to_string()
    }

    async fn deploy_queue(&self, name: &str, address: &str) -> Result<(), ManagementError> {
        info!(component = COMPONENT, broker = %self.broker_id(), queue = name, address, "deploying queue");
        self.invoke_operation(
            BROKER_RESOURCE,
            "deployQueue",
            vec![json!(address), json!(name), Value::Null, json!(false)],
        )
        .await?;
        Ok(())
    }

    async fn destroy_queue(&self, name: &str) -> Result<(), ManagementError> {
        info!(component = COMPONENT, broker = %self.broker_id(), queue = name, "destroying queue");
        self.invoke_operation(BROKER_RESOURCE, "destroyQueue", vec![json!(name), json!(true)])
            .await?;
        Ok(())
    }

    async fn pause_queue(&self, name: &str) -> Result<(), ManagementError> {
        info!(component = COMPONENT, broker = %self.broker_id(), queue = name, "pausing queue");
        self.invoke_operation(&queue_resource(name), "pause", vec![])
            .await?;
        Ok(())
    }

    async fn resume_queue(&self, name: &str) -> Result<(), ManagementError> {
        info!(component = COMPONENT, broker = %self.broker_id(), queue = name, "resuming queue");
        self.invoke_operation(&queue_resource(name), "resume", vec![])
            .await?;
        Ok(())
    }

    async fn create_connector_service(
        &self,
        name: &str,
        connection_params: &BTreeMap<String, String>,
    ) -> Result<(), ManagementError> {
        info!(component = COMPONENT, broker = %self.broker_id(), connector = name, "creating connector service");
        let params: Map<String, Value> = connection_params
            .iter()
            .map(|(key, value)| (key.clone(), json!(value)))
            .collect();
        self.invoke_operation(
            BROKER_RESOURCE,
            "createConnectorService",
            vec![
                json!(name),
                json!(AMQP_CONNECTOR_SERVICE_FACTORY),
                Value::Object(params),
            ],
        )
        .await?;
        Ok(())
    }

    async fn destroy_connector_service(&self, name: &str) -> Result<(), ManagementError> {
        self.invoke_operation(BROKER_RESOURCE, "destroyConnectorService", vec![json!(name)])
            .await?;
        info!(component = COMPONENT, broker = %self.broker_id(), connector = name, "destroyed connector service");
        Ok(())
    }

    async fn create_divert(
        &self,
        name: &str,
        routing_name: &str,
        address: &str,
        forwarding_address: &str,
    ) -> Result<(), ManagementError> {
        info!(component = COMPONENT, broker = %self.broker_id(), divert = name, "creating divert");
        self.invoke_operation(
            BROKER_RESOURCE,
            "createDivert",
            vec![
                json!(name),
                json!(routing_name),
                json!(address),
                json!(forwarding_address),
                json!(false),
                Value::Null,
                Value::Null,
            ],
        )
        .await?;
        Ok(())
    }

    async fn destroy_divert(&self, name: &str) -> Result<(), ManagementError> {
        info!(component = COMPONENT, broker = %self.broker_id(), divert = name, "destroying divert");
        self.invoke_operation(BROKER_RESOURCE, "destroyDivert", vec![json!(name)])
            .await?;
        Ok(())
    }

    async fn get_queue_names(&self) -> Result<BTreeSet<String>, ManagementError> {
        info!(component = COMPONENT, broker = %self.broker_id(), "retrieving queue names");
        let response = self
            .invoke_operation(BROKER_RESOURCE, "getQueueNames", vec![])
            .await?;
        Ok(response
            .nested_names()?
            .into_iter()
            .filter(|queue_name| queue_name != self.reply_to())
            .collect())
    }

    async fn get_divert_names(&self) -> Result<BTreeSet<String>, ManagementError> {
        info!(component = COMPONENT, broker = %self.broker_id(), "retrieving divert names");
        let response = self
            .invoke_operation(BROKER_RESOURCE, "getDivertNames", vec![])
            .await?;
        Ok(response.nested_names()?.into_iter().collect())
    }

    async fn get_queue_message_count(&self, queue_name: &str) -> Result<i64, ManagementError> {
        info!(component = COMPONENT, broker = %self.broker_id(), queue = queue_name, "checking message count");
        self.invoke_attribute(&queue_resource(queue_name), "messageCount", vec![])
            .await?
            .first_i64()
    }

    async fn get_queue_address(&self, queue_name: &str) -> Result<String, ManagementError> {
        info!(component = COMPONENT, broker = %self.broker_id(), queue = queue_name, "checking queue address");
        self.invoke_operation(&queue_resource(queue_name), "getAddress", vec![])
            .await?
            .first_string()
    }

    async fn get_divert_routing_name(&self, divert_name: &str) -> Result<String, ManagementError> {
        info!(component = COMPONENT, broker = %self.broker_id(), divert = divert_name, "getting divert routing name");
        self.invoke_operation(&divert_resource(divert_name), "getRoutingName", vec![])
            .await?
            .first_string()
    }

    async fn get_divert_address(&self, divert_name: &str) -> Result<String, ManagementError> {
        info!(component = COMPONENT, broker = %self.broker_id(), divert = divert_name, "getting divert address");
        self.invoke_operation(&divert_resource(divert_name), "getAddress", vec![])
            .await?
            .first_string()
    }

    async fn get_divert_forwarding_address(
        &self,
        divert_name: &str,
    ) -> Result<String, ManagementError> {
        info!(component = COMPONENT, broker = %self.broker_id(), divert = divert_name, "getting divert forwarding address");
        self.invoke_operation(&divert_resource(divert_name), "getForwardingAddress", vec![])
            .await?
            .first_string()
    }

    async fn force_shutdown(&self) -> Result<(), ManagementError> {
        info!(component = COMPONENT, broker = %self.broker_id(), "sending forceFailover");
        self.invoke_operation_with_timeout(BROKER_RESOURCE, "forceFailover", vec![], FAILOVER_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn close(&self) {
        ManagementClient::close(self).await
    }
}
