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

//! Per-cluster diff between desired addresses and broker state.

use crate::management::{BrokerOperations, ManagementError};
use crate::model::Address;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

/// What one broker currently hosts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BrokerState {
    pub queues: BTreeSet<String>,
    /// Divert name to forwarding address.
    pub diverts: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileAction {
    DeployQueue { name: String, address: String },
    DestroyDivert { name: String },
    DestroyQueue { name: String },
}

impl ReconcileAction {
    pub async fn apply(&self, broker: &dyn BrokerOperations) -> Result<(), ManagementError> {
        match self {
            ReconcileAction::DeployQueue { name, address } => {
                broker.deploy_queue(name, address).await
            }
            ReconcileAction::DestroyDivert { name } => broker.destroy_divert(name).await,
            ReconcileAction::DestroyQueue { name } => broker.destroy_queue(name).await,
        }
    }
}

impl Display for ReconcileAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileAction::DeployQueue { name, address } => {
                write!(f, "deployQueue({name} -> {address})")
            }
            ReconcileAction::DestroyDivert { name } => write!(f, "destroyDivert({name})"),
            ReconcileAction::DestroyQueue { name } => write!(f, "destroyQueue({name})"),
        }
    }
}

/// Ordered corrective actions for one cluster.
///
/// Missing queues are deployed first, then diverts forwarding into a queue
/// that is going away are removed, then surplus queues are destroyed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    actions: Vec<ReconcileAction>,
}

impl ReconcilePlan {
    pub fn compute(desired: &BTreeSet<Address>, actual: &BrokerState) -> Self {
        let wanted: BTreeSet<&str> = desired
            .iter()
            .map(|address| address.address.as_str())
            .collect();

        let mut actions: Vec<ReconcileAction> = wanted
            .iter()
            .filter(|address| !actual.queues.contains(**address))
            .map(|address| ReconcileAction::DeployQueue {
                name: address.to_string(),
                address: address.to_string(),
            })
            .collect();

        let surplus: BTreeSet<&str> = actual
            .queues
            .iter()
            .map(String::as_str)
            .filter(|name| !wanted.contains(name))
            .collect();

        actions.extend(
            actual
                .diverts
                .iter()
                .filter(|(_, forwarding_address)| surplus.contains(forwarding_address.as_str()))
                .map(|(name, _)| ReconcileAction::DestroyDivert { name: name.clone() }),
        );
        actions.extend(surplus.into_iter().map(|name| ReconcileAction::DestroyQueue {
            name: name.to_string(),
        }));

        Self { actions }
    }

    pub fn actions(&self) -> &[ReconcileAction] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Whether carrying out the plan destroys anything; divert state only
    /// matters then.
    pub fn destroys_queues(&self) -> bool {
        self.actions
            .iter()
            .any(|action| matches!(action, ReconcileAction::DestroyQueue { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::{BrokerState, ReconcileAction, ReconcilePlan};
    use crate::model::{Address, AddressType, Plan};
    use std::collections::BTreeSet;

    fn desired(names: &[&str]) -> BTreeSet<Address> {
        names
            .iter()
            .map(|name| Address::new(name, AddressType::Queue, Plan::named("pooled-small")))
            .collect()
    }

    fn broker(queues: &[&str], diverts: &[(&str, &str)]) -> BrokerState {
        BrokerState {
            queues: queues.iter().map(|name| name.to_string()).collect(),
            diverts: diverts
                .iter()
                .map(|(name, target)| (name.to_string(), target.to_string()))
                .collect(),
        }
    }

    #[test]
    fn deploys_before_destroying() {
        let plan = ReconcilePlan::compute(&desired(&["q1", "q2"]), &broker(&["q2", "q3"], &[]));

        assert_eq!(
            plan.actions(),
            &[
                ReconcileAction::DeployQueue {
                    name: "q1".to_string(),
                    address: "q1".to_string()
                },
                ReconcileAction::DestroyQueue {
                    name: "q3".to_string()
                },
            ]
        );
    }

    #[test]
    fn removes_diverts_into_destroyed_queues_first() {
        let plan = ReconcilePlan::compute(
            &desired(&["q1"]),
            &broker(&["q1", "q3"], &[("to-q3", "q3"), ("to-q1", "q1")]),
        );

        assert_eq!(
            plan.actions(),
            &[
                ReconcileAction::DestroyDivert {
                    name: "to-q3".to_string()
                },
                ReconcileAction::DestroyQueue {
                    name: "q3".to_string()
                },
            ]
        );
    }

    #[test]
    fn converged_cluster_needs_nothing() {
        let plan = ReconcilePlan::compute(&desired(&["q1", "q2"]), &broker(&["q1", "q2"], &[]));
        assert!(plan.is_empty());
        assert!(!plan.destroys_queues());
    }

    #[test]
    fn queue_is_named_after_its_routable_address() {
        let mut address = Address::new("space.orders", AddressType::Queue, Plan::named("dedicated"));
        address.address = "orders".to_string();

        let plan = ReconcilePlan::compute(&BTreeSet::from([address]), &BrokerState::default());

        assert_eq!(
            plan.actions(),
            &[ReconcileAction::DeployQueue {
                name: "orders".to_string(),
                address: "orders".to_string()
            }]
        );
    }
}
