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

//! Management request encoding.

use crate::observability::fields;
use crate::transport::TransportMessage;
use serde_json::Value;

pub const MANAGEMENT_ADDRESS: &str = "activemq.management";
pub const RESOURCE_NAME_PROPERTY: &str = "_AMQ_ResourceName";
pub const OPERATION_NAME_PROPERTY: &str = "_AMQ_OperationName";
pub const ATTRIBUTE_PROPERTY: &str = "_AMQ_Attribute";
pub const JMS_REPLY_TO_PROPERTY: &str = "JMSReplyTo";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestMember {
    Operation(String),
    Attribute(String),
}

impl RequestMember {
    pub fn name(&self) -> &str {
        match self {
            RequestMember::Operation(name) | RequestMember::Attribute(name) => name,
        }
    }

    fn property_key(&self) -> &'static str {
        match self {
            RequestMember::Operation(_) => OPERATION_NAME_PROPERTY,
            RequestMember::Attribute(_) => ATTRIBUTE_PROPERTY,
        }
    }
}

/// One management call against a broker resource.
#[derive(Clone, Debug, PartialEq)]
pub struct ManagementRequest {
    pub resource: String,
    pub member: RequestMember,
    /// Positional parameters; `Value::Null` entries are sent as JSON `null`.
    pub params: Vec<Value>,
}

impl ManagementRequest {
    pub fn operation(resource: &str, operation: &str, params: Vec<Value>) -> Self {
        Self {
            resource: resource.to_string(),
            member: RequestMember::Operation(operation.to_string()),
            params,
        }
    }

    pub fn attribute(resource: &str, attribute: &str, params: Vec<Value>) -> Self {
        Self {
            resource: resource.to_string(),
            member: RequestMember::Attribute(attribute.to_string()),
            params,
        }
    }

    /// `resource.member`, used in diagnostics.
    pub fn target(&self) -> String {
        format!("{}.{}", self.resource, self.member.name())
    }

    pub fn encoded_params(&self) -> String {
        fields::format_params(&self.params)
    }

    pub fn to_message(&self, message_id: &str, reply_to: &str) -> TransportMessage {
        TransportMessage {
            message_id: Some(message_id.to_string()),
            correlation_id: None,
            reply_to: Some(reply_to.to_string()),
            application_properties: vec![
                (RESOURCE_NAME_PROPERTY.to_string(), self.resource.clone()),
                (
                    self.member.property_key().to_string(),
                    self.member.name().to_string(),
                ),
                (JMS_REPLY_TO_PROPERTY.to_string(), reply_to.to_string()),
            ],
            body: Some(self.encoded_params()),
        }
    }
}
