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

//! Address-to-cluster classification.

use crate::model::Address;
use std::collections::{BTreeMap, BTreeSet};

/// Complete desired state: cluster id to the queue addresses it hosts.
///
/// Always rebuilt from a full address list; never patched.
pub type ClusterGroups = BTreeMap<String, BTreeSet<Address>>;

/// Pooled addresses share the cluster named after their plan, every other
/// address gets a cluster of its own.
pub fn cluster_id_for(address: &Address) -> String {
    if address.plan.is_pooled() {
        address.plan.name.clone()
    } else {
        address.name.clone()
    }
}

/// Groups the queue-typed addresses of `addresses` by cluster id.
pub fn classify<'a, I>(addresses: I) -> ClusterGroups
where
    I: IntoIterator<Item = &'a Address>,
{
    let mut groups = ClusterGroups::new();
    for address in addresses
        .into_iter()
        .filter(|address| address.address_type.is_queue())
    {
        groups
            .entry(cluster_id_for(address))
            .or_default()
            .insert(address.clone());
    }
    groups
}
