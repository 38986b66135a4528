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

//! Process assembly for the broker reconciler: configuration loading, the
//! cluster readiness watcher and the wiring between the address feed, the
//! reconciler and the broker management clients.

#[cfg(feature = "amqp-transport")]
pub mod amqp;
pub mod config;
pub mod wiring;

pub use config::{ConfigError, ReconcilerConfig};
pub use wiring::{ReadinessWatcher, ReconcilerProcess};
