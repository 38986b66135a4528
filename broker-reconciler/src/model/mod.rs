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

//! Desired-state model.
//!
//! Addresses arrive from the configuration feed and are grouped by the broker
//! cluster that hosts them. The grouping rule lives in [`classification`] and is
//! the single place cluster ids are derived, so the listener and the reconciler
//! can never disagree on colocation.

pub mod address;
pub mod classification;
pub mod naming;

pub use address::{Address, AddressType, Plan};
pub use classification::{classify, cluster_id_for, ClusterGroups};
