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

//! Address configuration feed.
//!
//! The configuration service publishes the complete address list on
//! [`FEED_ADDRESS`] whenever it changes. Each message is decoded, reduced to
//! queues, grouped by cluster and handed to an [`AddressConfigListener`] as a
//! full replacement snapshot.

mod decode;
mod listener;

pub use decode::{decode_address_config, decode_addresses, DecodeError};
pub use listener::{
    AddressConfigListener, ConfigStreamListener, ListenerState, FEED_ADDRESS, RECONNECT_DELAY,
};
