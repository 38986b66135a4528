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

//! Cached management clients, one per cluster.

use crate::management::{BrokerOperations, ManagementClient, ManagementError, RetryPolicy};
use crate::model::naming::sanitize_name;
use crate::observability::events;
use crate::transport::{Connector, Endpoint, TransportOptions};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

const COMPONENT: &str = "broker_pool";

pub const CLUSTER_PLACEHOLDER: &str = "{cluster}";

/// Opens a management client for the broker serving a cluster.
#[async_trait]
pub trait BrokerClientFactory: Send + Sync {
    async fn connect(&self, cluster_id: &str) -> Result<Arc<dyn BrokerOperations>, ManagementError>;
}

/// Resolves the broker host from a template such as `broker-{cluster}.svc`.
pub struct ManagementClientFactory {
    connector: Arc<dyn Connector>,
    host_template: String,
    port: u16,
    options: TransportOptions,
    policy: RetryPolicy,
}

impl ManagementClientFactory {
    pub fn new(
        connector: Arc<dyn Connector>,
        host_template: &str,
        port: u16,
        options: TransportOptions,
    ) -> Self {
        Self {
            connector,
            host_template: host_template.to_string(),
            port,
            options,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn endpoint_for(&self, cluster_id: &str) -> Endpoint {
        let host = self
            .host_template
            .replace(CLUSTER_PLACEHOLDER, &sanitize_name(cluster_id));
        Endpoint::new(&host, self.port)
    }
}

#[async_trait]
impl BrokerClientFactory for ManagementClientFactory {
    async fn connect(&self, cluster_id: &str) -> Result<Arc<dyn BrokerOperations>, ManagementError> {
        let endpoint = self.endpoint_for(cluster_id);
        debug!(component = COMPONENT, cluster_id, endpoint = %endpoint, "connecting to broker");
        let client = ManagementClient::connect_with_policy(
            self.connector.as_ref(),
            &endpoint,
            &self.options,
            self.policy,
        )
        .await?;
        Ok(Arc::new(client))
    }
}

/// Keeps one live client per cluster between reconciliation passes.
pub struct BrokerPool {
    factory: Arc<dyn BrokerClientFactory>,
    clients: Mutex<HashMap<String, Arc<dyn BrokerOperations>>>,
}

impl BrokerPool {
    pub fn new(factory: Arc<dyn BrokerClientFactory>) -> Self {
        Self {
            factory,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn lock_clients(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn BrokerOperations>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached client for `cluster_id`, connecting one if needed.
    pub async fn client(&self, cluster_id: &str) -> Result<Arc<dyn BrokerOperations>, ManagementError> {
        if let Some(client) = self.lock_clients().get(cluster_id) {
            return Ok(client.clone());
        }

        let client = self.factory.connect(cluster_id).await?;
        let replaced = self
            .lock_clients()
            .insert(cluster_id.to_string(), client.clone());
        if let Some(previous) = replaced {
            previous.close().await;
        }
        Ok(client)
    }

    /// Drops and closes the client of a cluster whose broker misbehaved.
    pub async fn evict(&self, cluster_id: &str) {
        let evicted = self.lock_clients().remove(cluster_id);
        if let Some(client) = evicted {
            info!(
                event = events::RECONCILE_CLIENT_EVICTED,
                component = COMPONENT,
                cluster_id,
                broker = %client.broker_id(),
                "evicting broker client"
            );
            client.close().await;
        }
    }

    pub fn cached_clusters(&self) -> Vec<String> {
        let mut clusters: Vec<String> = self.lock_clients().keys().cloned().collect();
        clusters.sort();
        clusters
    }

    pub async fn close_all(&self) {
        let clients: Vec<_> = self.lock_clients().drain().map(|(_, client)| client).collect();
        for client in clients {
            client.close().await;
        }
    }
}
