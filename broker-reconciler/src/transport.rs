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

//! Messaging transport seam.
//!
//! The control plane speaks to brokers and to the configuration service over an
//! asynchronous link-oriented transport (AMQP 1.0 in production). Everything in
//! this crate is written against the traits below so a concrete transport can be
//! plugged in by the process and recording transports can be used in tests.

use async_trait::async_trait;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub const CA_BUNDLE_FILE: &str = "ca.crt";
pub const CLIENT_CERT_FILE: &str = "tls.crt";
pub const CLIENT_KEY_FILE: &str = "tls.key";

/// Errors raised by a transport implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("unable to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },
    #[error("unable to attach link on {address}: {reason}")]
    Attach { address: String, reason: String },
    #[error("unable to send on {address}: {reason}")]
    Send { address: String, reason: String },
    #[error("connection closed")]
    Closed,
}

/// Network location of a peer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaslMechanism {
    Anonymous,
    External,
}

/// Mutual TLS material, read from PEM files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsOptions {
    pub ca_path: PathBuf,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportOptions {
    pub tls: Option<TlsOptions>,
    pub sasl_mechanisms: Vec<SaslMechanism>,
    pub verify_hostname: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            tls: None,
            sasl_mechanisms: vec![SaslMechanism::Anonymous],
            verify_hostname: true,
        }
    }
}

impl TransportOptions {
    /// Mutual TLS with `EXTERNAL` SASL using the well-known file names inside `cert_dir`.
    ///
    /// Peers are addressed by cluster-internal service identity rather than DNS
    /// name, so hostname verification is switched off.
    pub fn from_cert_dir(cert_dir: &Path) -> Self {
        Self {
            tls: Some(TlsOptions {
                ca_path: cert_dir.join(CA_BUNDLE_FILE),
                cert_path: cert_dir.join(CLIENT_CERT_FILE),
                key_path: cert_dir.join(CLIENT_KEY_FILE),
            }),
            sasl_mechanisms: vec![SaslMechanism::External],
            verify_hostname: false,
        }
    }

    pub fn from_optional_cert_dir(cert_dir: Option<&Path>) -> Self {
        match cert_dir {
            Some(dir) => Self::from_cert_dir(dir),
            None => Self::default(),
        }
    }
}

/// A message as seen by the control plane.
///
/// Only the sections the management protocol uses are modelled: the message
/// properties used for correlation, string-valued application properties and a
/// string value body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransportMessage {
    pub message_id: Option<String>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    pub application_properties: Vec<(String, String)>,
    pub body: Option<String>,
}

impl TransportMessage {
    pub fn application_property(&self, key: &str) -> Option<&str> {
        self.application_properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Source terminus requested when attaching a receiver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReceiverSource {
    Address(String),
    /// Ask the peer to create a temporary address and report it back.
    Dynamic,
}

impl Display for ReceiverSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReceiverSource::Address(address) => write!(f, "{address}"),
            ReceiverSource::Dynamic => write!(f, "<dynamic>"),
        }
    }
}

/// Callback side of a receiver link.
#[async_trait]
pub trait LinkListener: Send + Sync {
    async fn on_receive(&self, message: TransportMessage);

    /// The peer detached the receiver link.
    async fn on_detach(&self, _reason: Option<String>) {}
}

#[async_trait]
pub trait LinkSender: Send + Sync {
    async fn send(&self, message: TransportMessage) -> Result<(), TransportError>;
}

/// An open connection to one peer.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Container id announced by the peer, used to identify it in diagnostics.
    fn remote_container(&self) -> String;

    async fn open_sender(&self, address: &str) -> Result<Arc<dyn LinkSender>, TransportError>;

    /// Attaches a receiver and returns the source address the peer resolved.
    async fn open_receiver(
        &self,
        source: ReceiverSource,
        listener: Arc<dyn LinkListener>,
    ) -> Result<String, TransportError>;

    /// Resolves once the connection has been closed by either side.
    async fn closed(&self);

    /// Closes the connection. Calling this more than once has no further effect.
    async fn close(&self);
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        options: &TransportOptions,
    ) -> Result<Arc<dyn Connection>, TransportError>;
}
