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

//! Broker management RPC layer.
//!
//! A [`ManagementClient`] owns one connection to one broker with a sender link on
//! the broker's management address and a receiver link on a broker-assigned
//! reply address. Each request carries a fresh message id; the broker echoes it
//! as the reply's correlation id and the [`correlation`] table hands the reply to
//! the waiting call. Calls that outlive their deadline give up their table slot,
//! so a late reply is dropped instead of answering somebody else's request.
//!
//! Broker-level operations (queues, diverts, connector services) are expressed
//! on top of the two primitives `invoke_operation` / `invoke_attribute` in
//! [`BrokerOperations`].
//!
//! ```
//! use broker_reconciler::management::ManagementRequest;
//! use serde_json::{json, Value};
//!
//! let request = ManagementRequest::operation(
//!     "broker",
//!     "deployQueue",
//!     vec![json!("orders"), json!("orders"), Value::Null, json!(false)],
//! );
//! let message = request.to_message("id-1", "reply-address");
//!
//! assert_eq!(message.application_property("_AMQ_OperationName"), Some("deployQueue"));
//! assert_eq!(message.body.as_deref(), Some(r#"["orders","orders",null,false]"#));
//! ```

mod client;
pub(crate) mod correlation;
mod error;
pub(crate) mod link_setup;
mod operations;
mod request;
mod response;

pub use client::{ManagementClient, DEFAULT_REQUEST_TIMEOUT};
pub use error::ManagementError;
pub use link_setup::RetryPolicy;
pub use operations::{BrokerOperations, AMQP_CONNECTOR_SERVICE_FACTORY, FAILOVER_TIMEOUT};
pub use request::{
    ManagementRequest, RequestMember, ATTRIBUTE_PROPERTY, JMS_REPLY_TO_PROPERTY,
    MANAGEMENT_ADDRESS, OPERATION_NAME_PROPERTY, RESOURCE_NAME_PROPERTY,
};
pub use response::ManagementResponse;
