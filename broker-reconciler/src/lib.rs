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

//! # broker-reconciler
//!
//! `broker-reconciler` keeps a fleet of message brokers synchronized with the
//! desired set of addresses published on a configuration feed.
//!
//! The desired state arrives as full snapshots; every snapshot replaces the
//! previous one. Addresses are filtered down to queues and grouped by the
//! cluster that hosts them:
//!
//! ```
//! use broker_reconciler::model::{classify, Address, AddressType, Plan};
//!
//! let addresses = vec![
//!     Address::new("q1", AddressType::Queue, Plan::named("pooled-small")),
//!     Address::new("q2", AddressType::Queue, Plan::named("dedicated")),
//!     Address::new("t1", AddressType::Topic, Plan::named("dedicated")),
//! ];
//!
//! let groups = classify(&addresses);
//!
//! assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["pooled-small", "q2"]);
//! assert!(groups.values().flatten().all(|address| address.address_type.is_queue()));
//! ```
//!
//! ## Internal architecture map
//!
//! - Transport: the async link/connection seam a concrete messaging transport plugs into
//! - Management: correlated request/response client for one broker's management address
//! - Config stream: feed connection lifecycle, payload decoding and classification
//! - Reconcile: snapshot coalescing, per-cluster diff planning and broker client pool
//! - Cluster: the cluster directory consulted for readiness before converging a cluster
//!
//! ## Observability model
//!
//! The workspace uses `tracing` for logs/events.
//! Library code emits events and does not initialize a global subscriber.
//! Binaries and tests are responsible for one-time `tracing_subscriber`
//! initialization at process boundaries.

pub mod cluster;
pub mod config_stream;
pub mod management;
pub mod model;
#[doc(hidden)]
pub mod observability;
pub mod reconcile;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use cluster::{AddressCluster, ClusterError, ClusterResource, ClusterResourceManager};
pub use config_stream::{AddressConfigListener, ConfigStreamListener, ListenerState};
pub use management::{BrokerOperations, ManagementClient, ManagementError};
pub use reconcile::{PassReport, Reconciler};
