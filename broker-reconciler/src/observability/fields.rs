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

//! Field formatting helpers shared by log call sites.

use crate::model::ClusterGroups;
use serde_json::Value;

/// Renders management parameters the way they travel on the wire.
pub fn format_params(params: &[Value]) -> String {
    Value::Array(params.to_vec()).to_string()
}

/// `cluster-id(count)` pairs, in cluster order.
pub fn format_cluster_groups(groups: &ClusterGroups) -> String {
    groups
        .iter()
        .map(|(cluster_id, addresses)| format!("{cluster_id}({})", addresses.len()))
        .collect::<Vec<_>>()
        .join(",")
}
