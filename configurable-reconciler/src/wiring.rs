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

use crate::config::ReconcilerConfig;
use broker_reconciler::cluster::ClusterResourceManager;
use broker_reconciler::config_stream::ConfigStreamListener;
use broker_reconciler::observability::events;
use broker_reconciler::reconcile::{ManagementClientFactory, PassReport, Reconciler};
use broker_reconciler::transport::Connector;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

const COMPONENT: &str = "configurable_reconciler";

/// Polls the cluster directory and asks the reconciler for a pass whenever
/// the set of ready clusters changes.
pub struct ReadinessWatcher {
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReadinessWatcher {
    pub fn start(
        directory: Arc<dyn ClusterResourceManager>,
        reconciler: Arc<Reconciler>,
        interval: Duration,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(poll_readiness(directory, reconciler, interval, shutdown_rx));
        Self {
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    pub async fn stop(&self) {
        let Some(task) = self.task.lock().await.take() else {
            return;
        };
        self.shutdown.send_replace(true);
        if let Err(err) = task.await {
            warn!(component = COMPONENT, error = %err, "readiness watcher ended abnormally");
        }
    }
}

async fn poll_readiness(
    directory: Arc<dyn ClusterResourceManager>,
    reconciler: Arc<Reconciler>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen: Option<BTreeMap<String, bool>> = None;

    loop {
        tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => break,
            _ = ticker.tick() => {}
        }

        let clusters = match directory.list_clusters().await {
            Ok(clusters) => clusters,
            Err(err) => {
                warn!(
                    event = events::DIRECTORY_POLL_FAILED,
                    component = COMPONENT,
                    error = %err,
                    "unable to list clusters"
                );
                continue;
            }
        };
        let readiness: BTreeMap<String, bool> = clusters
            .iter()
            .map(|cluster| (cluster.cluster_id.clone(), cluster.is_ready()))
            .collect();

        if last_seen.as_ref().is_some_and(|previous| *previous != readiness) {
            info!(
                event = events::DIRECTORY_READINESS_CHANGED,
                component = COMPONENT,
                ready = readiness.values().filter(|ready| **ready).count(),
                total = readiness.len(),
                "cluster readiness changed"
            );
            reconciler.readiness_changed();
        }
        last_seen = Some(readiness);
    }
}

/// The running control plane: feed listener, reconciler and readiness watcher.
pub struct ReconcilerProcess {
    listener: ConfigStreamListener,
    reconciler: Arc<Reconciler>,
    readiness: ReadinessWatcher,
}

impl ReconcilerProcess {
    /// `connector` is used both for the configuration feed and for every broker.
    pub fn start(
        config: &ReconcilerConfig,
        connector: Arc<dyn Connector>,
        directory: Arc<dyn ClusterResourceManager>,
    ) -> Self {
        let factory = ManagementClientFactory::new(
            connector.clone(),
            &config.broker.host_template,
            config.broker.port,
            config.broker_options(),
        );
        let reconciler = Arc::new(Reconciler::start(directory.clone(), Arc::new(factory)));
        let readiness = ReadinessWatcher::start(
            directory,
            reconciler.clone(),
            config.readiness_poll_interval(),
        );
        let listener = ConfigStreamListener::start(
            connector,
            config.config_service_endpoint(),
            config.config_service_options(),
            reconciler.clone(),
        );

        info!(
            component = COMPONENT,
            config_service = %config.config_service_endpoint(),
            host_template = %config.broker.host_template,
            "reconciler started"
        );
        Self {
            listener,
            reconciler,
            readiness,
        }
    }

    pub fn listener(&self) -> &ConfigStreamListener {
        &self.listener
    }

    pub fn subscribe_reports(&self) -> watch::Receiver<PassReport> {
        self.reconciler.subscribe_reports()
    }

    /// Stops intake first, then lets any running pass finish before closing
    /// broker connections.
    pub async fn shutdown(&self) {
        self.listener.stop().await;
        self.readiness.stop().await;
        self.reconciler.stop().await;
        info!(component = COMPONENT, "reconciler stopped");
    }
}
