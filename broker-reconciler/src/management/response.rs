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

//! Management reply decoding.
//!
//! Replies are JSON documents whose shape depends on the operation: scalar
//! reads come back as a one-element array, enumerations as an array of arrays.

use crate::management::ManagementError;
use crate::transport::TransportMessage;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub struct ManagementResponse {
    broker: String,
    target: String,
    body: Value,
}

impl ManagementResponse {
    pub(crate) fn from_reply(
        broker: &str,
        target: &str,
        reply: &TransportMessage,
    ) -> Result<Self, ManagementError> {
        let body = match reply.body.as_deref() {
            None => Value::Null,
            Some(raw) if raw.trim().is_empty() => Value::Null,
            Some(raw) => serde_json::from_str(raw).map_err(|err| ManagementError::Decode {
                broker: broker.to_string(),
                target: target.to_string(),
                reason: format!("invalid JSON payload '{raw}': {err}"),
            })?,
        };

        Ok(Self {
            broker: broker.to_string(),
            target: target.to_string(),
            body,
        })
    }

    pub fn value(&self) -> &Value {
        &self.body
    }

    pub fn into_value(self) -> Value {
        self.body
    }

    fn decode_error(&self, reason: &str) -> ManagementError {
        ManagementError::Decode {
            broker: self.broker.clone(),
            target: self.target.clone(),
            reason: format!("{reason}, got {}", self.body),
        }
    }

    fn first(&self) -> Option<&Value> {
        match &self.body {
            Value::Array(values) => values.first(),
            Value::Null => None,
            scalar => Some(scalar),
        }
    }

    pub fn first_string(&self) -> Result<String, ManagementError> {
        self.first()
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| self.decode_error("expected a string result"))
    }

    pub fn first_i64(&self) -> Result<i64, ManagementError> {
        self.first()
            .and_then(Value::as_i64)
            .ok_or_else(|| self.decode_error("expected an integer result"))
    }

    /// Flattens an array of string arrays into names, in reply order.
    pub fn nested_names(&self) -> Result<Vec<String>, ManagementError> {
        let Value::Array(outer) = &self.body else {
            return Err(self.decode_error("expected an array of name arrays"));
        };

        let mut names = Vec::new();
        for inner in outer {
            match inner {
                Value::Array(values) => {
                    for value in values {
                        let name = value
                            .as_str()
                            .ok_or_else(|| self.decode_error("expected string names"))?;
                        names.push(name.to_string());
                    }
                }
                Value::String(name) => names.push(name.clone()),
                _ => return Err(self.decode_error("expected an array of name arrays")),
            }
        }
        Ok(names)
    }
}
