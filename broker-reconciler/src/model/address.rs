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

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

const POOLED_PLAN_PREFIX: &str = "pooled";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AddressType {
    Queue,
    Topic,
    Anycast,
    Multicast,
    Other(String),
}

impl AddressType {
    pub fn is_queue(&self) -> bool {
        matches!(self, AddressType::Queue)
    }

    pub fn as_str(&self) -> &str {
        match self {
            AddressType::Queue => "queue",
            AddressType::Topic => "topic",
            AddressType::Anycast => "anycast",
            AddressType::Multicast => "multicast",
            AddressType::Other(name) => name,
        }
    }
}

impl From<String> for AddressType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "queue" => AddressType::Queue,
            "topic" => AddressType::Topic,
            "anycast" => AddressType::Anycast,
            "multicast" => AddressType::Multicast,
            _ => AddressType::Other(value),
        }
    }
}

impl From<AddressType> for String {
    fn from(value: AddressType) -> Self {
        value.as_str().to_string()
    }
}

impl Display for AddressType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capacity/placement policy of an address.
///
/// Plan definitions may state whether they are pooled. When only the plan name
/// is known the `pooled` name prefix convention decides.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pooled: Option<bool>,
}

impl Plan {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pooled: None,
        }
    }

    pub fn is_pooled(&self) -> bool {
        self.pooled
            .unwrap_or_else(|| self.name.starts_with(POOLED_PLAN_PREFIX))
    }
}

/// One routable destination from the configuration feed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub name: String,
    /// Routable address the broker queue is bound to.
    pub address: String,
    pub address_type: AddressType,
    pub plan: Plan,
}

impl Address {
    pub fn new(name: &str, address_type: AddressType, plan: Plan) -> Self {
        Self {
            name: name.to_string(),
            address: name.to_string(),
            address_type,
            plan,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_name_prefix_marks_pooled() {
        assert!(Plan::named("pooled-small").is_pooled());
        assert!(Plan::named("pooled").is_pooled());
        assert!(!Plan::named("dedicated").is_pooled());
        assert!(!Plan::named("small-pooled").is_pooled());
    }

    #[test]
    fn explicit_pooled_attribute_wins_over_name() {
        let plan = Plan {
            name: "pooled-but-not-really".to_string(),
            pooled: Some(false),
        };
        assert!(!plan.is_pooled());

        let plan = Plan {
            name: "shared".to_string(),
            pooled: Some(true),
        };
        assert!(plan.is_pooled());
    }

    #[test]
    fn unknown_address_types_are_kept_verbatim() {
        let address_type = AddressType::from("durable-subscription".to_string());
        assert_eq!(
            address_type,
            AddressType::Other("durable-subscription".to_string())
        );
        assert!(!address_type.is_queue());
        assert_eq!(address_type.to_string(), "durable-subscription");
    }
}
