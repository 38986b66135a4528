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

//! Convergence of broker queues towards the desired address snapshot.
//!
//! Clusters missing from a snapshot are left alone; tearing a cluster down is
//! the provisioning side's job.

mod broker_pool;
mod plan;
mod reconciler;

pub use broker_pool::{BrokerClientFactory, BrokerPool, ManagementClientFactory, CLUSTER_PLACEHOLDER};
pub use plan::{BrokerState, ReconcileAction, ReconcilePlan};
pub use reconciler::{PassReport, ReconcileError, Reconciler};
