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

pub const MANAGEMENT_CONNECTED: &str = "management_connected";
pub const MANAGEMENT_LINK_ATTACH_RETRY: &str = "management_link_attach_retry";
pub const MANAGEMENT_LINK_ATTACH_FAILED: &str = "management_link_attach_failed";
pub const MANAGEMENT_REQUEST: &str = "management_request";
pub const MANAGEMENT_TIMEOUT: &str = "management_timeout";
pub const MANAGEMENT_REPLY_UNMATCHED: &str = "management_reply_unmatched";
pub const MANAGEMENT_REPLY_LINK_DETACHED: &str = "management_reply_link_detached";
pub const MANAGEMENT_CLOSED: &str = "management_closed";

pub const CONFIG_STATE_CHANGED: &str = "config_state_changed";
pub const CONFIG_CONNECT_FAILED: &str = "config_connect_failed";
pub const CONFIG_RECONNECT_SCHEDULED: &str = "config_reconnect_scheduled";
pub const CONFIG_DECODE_FAILED: &str = "config_decode_failed";
pub const CONFIG_SNAPSHOT_DELIVERED: &str = "config_snapshot_delivered";

pub const RECONCILE_PASS_START: &str = "reconcile_pass_start";
pub const RECONCILE_PASS_DONE: &str = "reconcile_pass_done";
pub const RECONCILE_CLUSTER_DEFERRED: &str = "reconcile_cluster_deferred";
pub const RECONCILE_CLUSTER_FAILED: &str = "reconcile_cluster_failed";
pub const RECONCILE_ACTION_APPLIED: &str = "reconcile_action_applied";
pub const RECONCILE_CLIENT_EVICTED: &str = "reconcile_client_evicted";

pub const DIRECTORY_READINESS_CHANGED: &str = "directory_readiness_changed";
pub const DIRECTORY_POLL_FAILED: &str = "directory_poll_failed";
