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

//! Bounded retry for management link attachment.

use crate::observability::events;
use crate::transport::TransportError;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

const COMPONENT: &str = "management_link_setup";

/// Fixed-delay retry bound applied to each management link separately.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            delay: Duration::from_secs(1),
        }
    }
}

/// Runs `attempt` until it succeeds or `policy.max_retries` retries have failed,
/// returning the last error in the latter case.
pub(crate) async fn with_retries<T, F, Fut>(
    policy: RetryPolicy,
    broker: &str,
    link: &str,
    mut attempt: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if retries >= policy.max_retries => {
                warn!(
                    event = events::MANAGEMENT_LINK_ATTACH_FAILED,
                    component = COMPONENT,
                    broker,
                    link,
                    retries,
                    err = %err,
                    "giving up creating management link"
                );
                return Err(err);
            }
            Err(err) => {
                info!(
                    event = events::MANAGEMENT_LINK_ATTACH_RETRY,
                    component = COMPONENT,
                    broker,
                    link,
                    retries,
                    err = %err,
                    "error creating management link, retrying"
                );
                retries += 1;
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}
