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

use async_trait::async_trait;
use broker_reconciler::cluster::{AddressCluster, ClusterError, ClusterResourceManager};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::{self, canonicalize};
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct ClusterDirectoryDocument {
    #[serde(default)]
    clusters: Vec<AddressCluster>,
}

/// Read-only cluster directory backed by a JSON file.
///
/// The file is re-read on every call, so edits show up on the next
/// reconciliation pass without restarting the process.
pub struct ClusterStaticFile {
    static_file: String,
}

impl ClusterStaticFile {
    pub fn new(static_file: String) -> Self {
        Self { static_file }
    }

    fn canonicalized_static_file_path(&self) -> Result<PathBuf, ClusterError> {
        let cluster_json_file = PathBuf::from(self.static_file.clone());
        debug!("cluster_json_file: {cluster_json_file:?}");

        canonicalize(cluster_json_file).map_err(|error| {
            ClusterError::Unavailable(format!("Static cluster file not found: {error:?}"))
        })
    }

    fn read_static_clusters(&self) -> Result<Vec<AddressCluster>, ClusterError> {
        let cluster_json_file = self.canonicalized_static_file_path()?;
        let data = fs::read_to_string(cluster_json_file).map_err(|error| {
            ClusterError::Unavailable(format!("Unable to read file: {error:?}"))
        })?;

        let document: ClusterDirectoryDocument = serde_json::from_str(&data).map_err(|error| {
            ClusterError::Unavailable(format!("Unable to parse JSON: {error:?}"))
        })?;

        // Later entries for the same cluster id extend earlier ones.
        let mut clusters: BTreeMap<String, AddressCluster> = BTreeMap::new();
        for cluster in document.clusters {
            match clusters.get_mut(&cluster.cluster_id) {
                Some(existing) => {
                    warn!("Merging duplicate entry for cluster '{}'", cluster.cluster_id);
                    existing.resources.extend(cluster.resources);
                }
                None => {
                    clusters.insert(cluster.cluster_id.clone(), cluster);
                }
            }
        }
        Ok(clusters.into_values().collect())
    }
}

#[async_trait]
impl ClusterResourceManager for ClusterStaticFile {
    async fn list_clusters(&self) -> Result<Vec<AddressCluster>, ClusterError> {
        let clusters = self.read_static_clusters()?;
        debug!("Finished reading clusters\n{clusters:#?}");
        Ok(clusters)
    }
}
