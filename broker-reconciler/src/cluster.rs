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

//! Cluster directory consulted before converging a cluster.
//!
//! Provisioning broker clusters is done elsewhere; the reconciler only needs to
//! know which clusters exist and whether their workloads are up.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEPLOYMENT_KIND: &str = "Deployment";

/// Directory failures. Both are treated as "not yet" by the reconciler.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClusterError {
    #[error("not authorized to list clusters: {0}")]
    Unauthorized(String),
    #[error("cluster directory unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResource {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unavailable_replicas: Option<u32>,
}

impl ClusterResource {
    pub fn is_deployment(&self) -> bool {
        self.kind == DEPLOYMENT_KIND
    }

    pub fn is_ready(&self) -> bool {
        self.unavailable_replicas.unwrap_or(0) == 0
    }
}

/// Resources provisioned for one cluster id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressCluster {
    pub cluster_id: String,
    #[serde(default)]
    pub resources: Vec<ClusterResource>,
}

impl AddressCluster {
    /// Every deployment of the cluster is fully available.
    pub fn is_ready(&self) -> bool {
        self.resources
            .iter()
            .filter(|resource| resource.is_deployment())
            .all(ClusterResource::is_ready)
    }
}

#[async_trait]
pub trait ClusterResourceManager: Send + Sync {
    async fn list_clusters(&self) -> Result<Vec<AddressCluster>, ClusterError>;

    /// A cluster that does not exist is not ready.
    async fn is_cluster_ready(&self, cluster_id: &str) -> Result<bool, ClusterError> {
        Ok(self
            .list_clusters()
            .await?
            .iter()
            .any(|cluster| cluster.cluster_id == cluster_id && cluster.is_ready()))
    }
}

#[cfg(test)]
mod tests {
    use super::{AddressCluster, ClusterError, ClusterResource, ClusterResourceManager};
    use async_trait::async_trait;

    struct FixedDirectory(Vec<AddressCluster>);

    #[async_trait]
    impl ClusterResourceManager for FixedDirectory {
        async fn list_clusters(&self) -> Result<Vec<AddressCluster>, ClusterError> {
            Ok(self.0.clone())
        }
    }

    fn resource(kind: &str, unavailable_replicas: Option<u32>) -> ClusterResource {
        ClusterResource {
            kind: kind.to_string(),
            name: format!("{}-0", kind.to_lowercase()),
            unavailable_replicas,
        }
    }

    #[tokio::test]
    async fn readiness_only_looks_at_deployments() {
        let directory = FixedDirectory(vec![
            AddressCluster {
                cluster_id: "pooled-small".to_string(),
                resources: vec![
                    resource("Deployment", Some(0)),
                    resource("PersistentVolumeClaim", Some(3)),
                ],
            },
            AddressCluster {
                cluster_id: "q2".to_string(),
                resources: vec![resource("Deployment", None), resource("Deployment", Some(1))],
            },
        ]);

        assert!(directory.is_cluster_ready("pooled-small").await.unwrap());
        assert!(!directory.is_cluster_ready("q2").await.unwrap());
        assert!(!directory.is_cluster_ready("missing").await.unwrap());
    }

    #[test]
    fn cluster_json_uses_camel_case() {
        let cluster: AddressCluster = serde_json::from_str(
            r#"{"clusterId": "q1", "resources": [{"kind": "Deployment", "name": "broker", "unavailableReplicas": 2}]}"#,
        )
        .unwrap();

        assert_eq!(cluster.cluster_id, "q1");
        assert_eq!(cluster.resources[0].unavailable_replicas, Some(2));
        assert!(!cluster.is_ready());
    }
}
