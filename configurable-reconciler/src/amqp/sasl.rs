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

//! SASL `EXTERNAL` over an established TLS stream.
//!
//! The client certificate is the credential, so the exchange carries an empty
//! initial response. On success the stream is handed back positioned at the
//! AMQP protocol header.

use fe2o3_amqp::frames::sasl::Frame;
use fe2o3_amqp::transport::protocol_header::ProtocolHeaderCodec;
use fe2o3_amqp::transport::Transport;
use fe2o3_amqp::types::primitives::{Binary, Symbol};
use fe2o3_amqp::types::sasl::{SaslCode, SaslInit, SaslResponse};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};

pub const EXTERNAL: &str = "EXTERNAL";

#[derive(Debug, Error)]
pub enum SaslError {
    #[error("sasl negotiation failed: {0}")]
    Negotiation(String),
    #[error("peer does not offer EXTERNAL, only {0:?}")]
    NotOffered(Vec<String>),
    #[error("peer rejected EXTERNAL authentication with code {0:?}")]
    Rejected(SaslCode),
    #[error("unexpected sasl frame from peer: {0}")]
    Unexpected(String),
    #[error("peer closed the stream during sasl negotiation")]
    Eof,
}

fn negotiation<E: std::fmt::Display>(err: E) -> SaslError {
    SaslError::Negotiation(err.to_string())
}

pub async fn negotiate_external<Io>(stream: Io, hostname: &str) -> Result<Io, SaslError>
where
    Io: AsyncRead + AsyncWrite + std::fmt::Debug + Unpin,
{
    let (reader, writer) = tokio::io::split(stream);
    let mut transport = Transport::<Io, Frame>::negotiate_sasl_header(
        FramedWrite::new(writer, ProtocolHeaderCodec::new()),
        FramedRead::new(reader, ProtocolHeaderCodec::new()),
    )
    .await
    .map_err(negotiation)?;

    loop {
        let frame = transport
            .next()
            .await
            .ok_or(SaslError::Eof)?
            .map_err(negotiation)?;
        let reply = match frame {
            Frame::Mechanisms(mechanisms) => {
                let offered: Vec<String> = mechanisms
                    .sasl_server_mechanisms
                    .0
                    .iter()
                    .map(|mechanism| mechanism.0.clone())
                    .collect();
                if !offered.iter().any(|mechanism| mechanism == EXTERNAL) {
                    return Err(SaslError::NotOffered(offered));
                }
                Frame::Init(SaslInit {
                    mechanism: Symbol::from(EXTERNAL),
                    initial_response: Some(Binary::new()),
                    hostname: Some(hostname.to_string()),
                })
            }
            Frame::Challenge(_) => Frame::Response(SaslResponse {
                response: Binary::new(),
            }),
            Frame::Outcome(outcome) => match outcome.code {
                SaslCode::Ok => break,
                code => return Err(SaslError::Rejected(code)),
            },
            other => return Err(SaslError::Unexpected(format!("{other:?}"))),
        };
        transport.send(reply).await.map_err(negotiation)?;
    }

    let (framed_write, framed_read) = transport.into_framed_codec();
    Ok(framed_read.into_inner().unsplit(framed_write.into_inner()))
}
