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

use crate::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ManagementError {
    /// Connection or link setup failed; carries the last cause seen.
    #[error("unable to establish management link to {endpoint}: {cause}")]
    Connection {
        endpoint: String,
        cause: TransportError,
    },
    /// No reply inside the deadline. The broker may still have executed the request.
    #[error("timed out getting response from broker {broker} on {target} with parameters: {params}")]
    Timeout {
        broker: String,
        target: String,
        params: String,
    },
    #[error("unable to send {target} to broker {broker}: {cause}")]
    Send {
        broker: String,
        target: String,
        cause: TransportError,
    },
    #[error("unable to decode response from broker {broker} on {target}: {reason}")]
    Decode {
        broker: String,
        target: String,
        reason: String,
    },
    #[error("management client for broker {broker} is closed")]
    Closed { broker: String },
}

impl ManagementError {
    /// Whether a later attempt on a fresh client could succeed.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            ManagementError::Connection { .. }
                | ManagementError::Send { .. }
                | ManagementError::Closed { .. }
        )
    }
}
