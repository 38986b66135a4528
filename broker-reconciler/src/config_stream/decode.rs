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

//! Address feed payload decoding.

use crate::model::{classify, Address, AddressType, ClusterGroups, Plan};
use serde::Deserialize;
use thiserror::Error;

/// A feed message that could not be turned into an address list.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("error decoding JSON payload '{payload}': {reason}")]
pub struct DecodeError {
    pub payload: String,
    pub reason: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AddressDocument {
    List { items: Vec<AddressEntry> },
    Bare(Vec<AddressEntry>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AddressEntry {
    Resource {
        metadata: ResourceMetadata,
        spec: ResourceSpec,
    },
    Flat(FlatAddress),
}

#[derive(Deserialize)]
struct ResourceMetadata {
    name: String,
}

#[derive(Deserialize)]
struct ResourceSpec {
    #[serde(default)]
    address: Option<String>,
    #[serde(rename = "type")]
    address_type: AddressType,
    plan: PlanRef,
}

#[derive(Deserialize)]
struct FlatAddress {
    name: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(rename = "type")]
    address_type: AddressType,
    plan: PlanRef,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanRef {
    Name(String),
    Definition(Plan),
}

impl From<PlanRef> for Plan {
    fn from(value: PlanRef) -> Self {
        match value {
            PlanRef::Name(name) => Plan::named(&name),
            PlanRef::Definition(plan) => plan,
        }
    }
}

impl From<AddressEntry> for Address {
    fn from(entry: AddressEntry) -> Self {
        let (name, address, address_type, plan) = match entry {
            AddressEntry::Resource { metadata, spec } => {
                (metadata.name, spec.address, spec.address_type, spec.plan)
            }
            AddressEntry::Flat(flat) => (flat.name, flat.address, flat.address_type, flat.plan),
        };
        Address {
            address: address.unwrap_or_else(|| name.clone()),
            name,
            address_type,
            plan: plan.into(),
        }
    }
}

/// Decodes a feed payload into its ordered address list.
pub fn decode_addresses(payload: &str) -> Result<Vec<Address>, DecodeError> {
    let document: AddressDocument =
        serde_json::from_str(payload).map_err(|err| DecodeError {
            payload: payload.to_string(),
            reason: err.to_string(),
        })?;
    let entries = match document {
        AddressDocument::List { items } => items,
        AddressDocument::Bare(entries) => entries,
    };
    Ok(entries.into_iter().map(Address::from).collect())
}

/// Decodes a feed payload and groups its queues by cluster.
pub fn decode_address_config(payload: &str) -> Result<ClusterGroups, DecodeError> {
    Ok(classify(&decode_addresses(payload)?))
}
