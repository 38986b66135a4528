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

use clap::Parser;
use cluster_static_file::ClusterStaticFile;
use configurable_reconciler::amqp::AmqpConnector;
use configurable_reconciler::{ReconcilerConfig, ReconcilerProcess};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(about = "Keeps broker queues in line with the address configuration feed")]
struct ReconcilerArgs {
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,
}

fn init_tracing(config_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_filter.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = ReconcilerArgs::parse();

    let config = match ReconcilerConfig::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configurable-reconciler: {err}");
            return ExitCode::from(2);
        }
    };
    init_tracing(config.log_filter.as_deref());
    info!(config = ?args.config, "loaded configuration");

    let directory = Arc::new(ClusterStaticFile::new(
        config.cluster_directory.static_file.clone(),
    ));
    let process = ReconcilerProcess::start(&config, Arc::new(AmqpConnector::default()), directory);

    let exit = match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("received interrupt, shutting down");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "unable to listen for shutdown signal");
            ExitCode::FAILURE
        }
    };
    process.shutdown().await;
    exit
}
