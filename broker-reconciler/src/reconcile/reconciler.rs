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

use crate::cluster::{ClusterError, ClusterResourceManager};
use crate::config_stream::AddressConfigListener;
use crate::management::{BrokerOperations, ManagementError};
use crate::model::{Address, ClusterGroups};
use crate::observability::{events, fields};
use crate::reconcile::broker_pool::{BrokerClientFactory, BrokerPool};
use crate::reconcile::plan::{BrokerState, ReconcileAction, ReconcilePlan};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const COMPONENT: &str = "reconciler";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("cluster {cluster_id}: {source}")]
    Broker {
        cluster_id: String,
        #[source]
        source: ManagementError,
    },
    #[error("cluster {cluster_id}: {source}")]
    Directory {
        cluster_id: String,
        #[source]
        source: ClusterError,
    },
}

/// Outcome of one reconciliation pass over a snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Sequence number, starting at 1.
    pub pass: u64,
    /// Clusters that were converged, with the actions that took.
    pub applied: BTreeMap<String, Vec<ReconcileAction>>,
    /// Clusters skipped because the directory did not report them ready.
    pub deferred: BTreeMap<String, String>,
    pub failed: BTreeMap<String, ReconcileError>,
}

impl PassReport {
    pub fn is_clean(&self) -> bool {
        self.deferred.is_empty() && self.failed.is_empty()
    }
}

enum ClusterOutcome {
    Applied(Vec<ReconcileAction>),
    Deferred(String),
    Failed(ReconcileError),
}

/// Converges broker queues towards the latest address snapshot.
///
/// Snapshots overwrite each other; one worker task runs passes one at a time
/// over whatever snapshot is newest when it gets to it.
pub struct Reconciler {
    snapshots: watch::Sender<Option<Arc<ClusterGroups>>>,
    readiness: Arc<Notify>,
    reports: watch::Receiver<PassReport>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Reconciler {
    pub fn start(
        directory: Arc<dyn ClusterResourceManager>,
        factory: Arc<dyn BrokerClientFactory>,
    ) -> Self {
        let (snapshots, snapshot_rx) = watch::channel(None);
        let (report_tx, reports) = watch::channel(PassReport::default());
        let (shutdown, shutdown_rx) = watch::channel(false);
        let readiness = Arc::new(Notify::new());

        let worker = Worker {
            directory,
            pool: BrokerPool::new(factory),
            reports: report_tx,
        };
        let task = tokio::spawn(worker.run(snapshot_rx, readiness.clone(), shutdown_rx));

        Self {
            snapshots,
            readiness,
            reports,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    /// Replaces the desired state and schedules a pass.
    pub fn submit(&self, groups: ClusterGroups) {
        self.snapshots.send_replace(Some(Arc::new(groups)));
    }

    /// Asks for another pass over the current snapshot, typically after the
    /// cluster directory saw a deployment become available.
    pub fn readiness_changed(&self) {
        self.readiness.notify_one();
    }

    /// Watches the report of the most recent pass.
    pub fn subscribe_reports(&self) -> watch::Receiver<PassReport> {
        self.reports.clone()
    }

    /// Stops the worker after any pass in progress and closes broker clients.
    pub async fn stop(&self) {
        let Some(task) = self.task.lock().await.take() else {
            return;
        };
        self.shutdown.send_replace(true);
        if let Err(err) = task.await {
            warn!(component = COMPONENT, error = %err, "reconciler task ended abnormally");
        }
    }
}

#[async_trait]
impl AddressConfigListener for Reconciler {
    async fn addresses_changed(&self, groups: ClusterGroups) {
        self.submit(groups);
    }
}

struct Worker {
    directory: Arc<dyn ClusterResourceManager>,
    pool: BrokerPool,
    reports: watch::Sender<PassReport>,
}

impl Worker {
    async fn run(
        self,
        mut snapshots: watch::Receiver<Option<Arc<ClusterGroups>>>,
        readiness: Arc<Notify>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut pass = 0;
        loop {
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => break,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = readiness.notified() => {}
            }

            let Some(groups) = snapshots.borrow_and_update().clone() else {
                debug!(component = COMPONENT, "no snapshot yet, nothing to reconcile");
                continue;
            };
            pass += 1;
            let report = self.run_pass(pass, &groups).await;
            self.reports.send_replace(report);
        }
        self.pool.close_all().await;
    }

    async fn run_pass(&self, pass: u64, groups: &ClusterGroups) -> PassReport {
        info!(
            event = events::RECONCILE_PASS_START,
            component = COMPONENT,
            pass,
            clusters = %fields::format_cluster_groups(groups),
            "starting reconciliation pass"
        );

        let readiness = self.cluster_readiness().await;
        let outcomes = join_all(groups.iter().map(|(cluster_id, desired)| {
            self.reconcile_cluster(cluster_id, desired, &readiness)
        }))
        .await;

        let mut report = PassReport {
            pass,
            ..Default::default()
        };
        for (cluster_id, outcome) in groups.keys().zip(outcomes) {
            match outcome {
                ClusterOutcome::Applied(actions) => {
                    report.applied.insert(cluster_id.clone(), actions);
                }
                ClusterOutcome::Deferred(reason) => {
                    report.deferred.insert(cluster_id.clone(), reason);
                }
                ClusterOutcome::Failed(err) => {
                    report.failed.insert(cluster_id.clone(), err);
                }
            }
        }

        self.release_departed_clusters(groups).await;

        info!(
            event = events::RECONCILE_PASS_DONE,
            component = COMPONENT,
            pass,
            applied = report.applied.len(),
            deferred = report.deferred.len(),
            failed = report.failed.len(),
            "reconciliation pass finished"
        );
        report
    }

    /// Lists the directory once per pass; a cluster it does not know is not ready.
    async fn cluster_readiness(&self) -> Result<BTreeMap<String, bool>, ClusterError> {
        let clusters = self.directory.list_clusters().await?;
        Ok(clusters
            .iter()
            .map(|cluster| (cluster.cluster_id.clone(), cluster.is_ready()))
            .collect())
    }

    /// Closes clients of clusters the snapshot no longer mentions. Their
    /// broker state is left as it is.
    async fn release_departed_clusters(&self, groups: &ClusterGroups) {
        for cluster_id in self.pool.cached_clusters() {
            if !groups.contains_key(&cluster_id) {
                debug!(
                    component = COMPONENT,
                    cluster_id = %cluster_id,
                    "cluster left the snapshot, releasing its broker client"
                );
                self.pool.evict(&cluster_id).await;
            }
        }
    }

    async fn reconcile_cluster(
        &self,
        cluster_id: &str,
        desired: &BTreeSet<Address>,
        readiness: &Result<BTreeMap<String, bool>, ClusterError>,
    ) -> ClusterOutcome {
        match readiness {
            Ok(ready) if ready.get(cluster_id).copied().unwrap_or(false) => {}
            Ok(_) => return self.defer(cluster_id, "cluster not ready".to_string()),
            Err(source) => {
                let err = ReconcileError::Directory {
                    cluster_id: cluster_id.to_string(),
                    source: source.clone(),
                };
                return self.defer(cluster_id, err.to_string());
            }
        }

        let broker = match self.pool.client(cluster_id).await {
            Ok(broker) => broker,
            Err(source) => return self.fail(cluster_id, source),
        };

        match converge(cluster_id, broker.as_ref(), desired).await {
            Ok(actions) => ClusterOutcome::Applied(actions),
            Err(source) => {
                if source.is_connection_loss() || matches!(source, ManagementError::Timeout { .. }) {
                    self.pool.evict(cluster_id).await;
                }
                self.fail(cluster_id, source)
            }
        }
    }

    fn defer(&self, cluster_id: &str, reason: String) -> ClusterOutcome {
        info!(
            event = events::RECONCILE_CLUSTER_DEFERRED,
            component = COMPONENT,
            cluster_id,
            reason = %reason,
            "deferring cluster"
        );
        ClusterOutcome::Deferred(reason)
    }

    fn fail(&self, cluster_id: &str, source: ManagementError) -> ClusterOutcome {
        let err = ReconcileError::Broker {
            cluster_id: cluster_id.to_string(),
            source,
        };
        warn!(
            event = events::RECONCILE_CLUSTER_FAILED,
            component = COMPONENT,
            cluster_id,
            error = %err,
            "cluster left unconverged until next pass"
        );
        ClusterOutcome::Failed(err)
    }
}

/// Reads the broker's state, plans the diff and applies it in plan order.
async fn converge(
    cluster_id: &str,
    broker: &dyn BrokerOperations,
    desired: &BTreeSet<Address>,
) -> Result<Vec<ReconcileAction>, ManagementError> {
    let mut state = BrokerState {
        queues: broker.get_queue_names().await?,
        ..Default::default()
    };

    let mut plan = ReconcilePlan::compute(desired, &state);
    if plan.destroys_queues() {
        for divert in broker.get_divert_names().await? {
            let forwarding_address = broker.get_divert_forwarding_address(&divert).await?;
            state.diverts.insert(divert, forwarding_address);
        }
        plan = ReconcilePlan::compute(desired, &state);
    }

    for action in plan.actions() {
        action.apply(broker).await?;
        info!(
            event = events::RECONCILE_ACTION_APPLIED,
            component = COMPONENT,
            cluster_id,
            broker = %broker.broker_id(),
            action = %action,
            "applied reconcile action"
        );
    }
    Ok(plan.actions().to_vec())
}

#[cfg(test)]
mod tests {
    use super::{PassReport, ReconcileError, Reconciler};
    use crate::cluster::{AddressCluster, ClusterError, ClusterResource, ClusterResourceManager};
    use crate::management::{BrokerOperations, ManagementError};
    use crate::model::{classify, Address, AddressType, Plan};
    use crate::reconcile::broker_pool::BrokerClientFactory;
    use crate::reconcile::plan::ReconcileAction;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, BTreeSet, HashMap};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// In-memory broker that records every mutating call.
    #[derive(Default)]
    struct RecordingBroker {
        queues: Mutex<BTreeSet<String>>,
        diverts: Mutex<BTreeMap<String, String>>,
        calls: Mutex<Vec<String>>,
        fail_reads: Mutex<Option<ManagementError>>,
        read_delay: Mutex<Duration>,
    }

    impl RecordingBroker {
        fn with_queues(queues: &[&str]) -> Arc<Self> {
            let broker = Self::default();
            *broker.queues.lock().unwrap() = queues.iter().map(|q| q.to_string()).collect();
            Arc::new(broker)
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl BrokerOperations for RecordingBroker {
        fn broker_id(&self) -> String {
            "recording-broker".to_string()
        }

        async fn deploy_queue(&self, name: &str, _address: &str) -> Result<(), ManagementError> {
            self.record(format!("deployQueue({name})"));
            self.queues.lock().unwrap().insert(name.to_string());
            Ok(())
        }

        async fn destroy_queue(&self, name: &str) -> Result<(), ManagementError> {
            self.record(format!("destroyQueue({name})"));
            self.queues.lock().unwrap().remove(name);
            Ok(())
        }

        async fn pause_queue(&self, _name: &str) -> Result<(), ManagementError> {
            Ok(())
        }

        async fn resume_queue(&self, _name: &str) -> Result<(), ManagementError> {
            Ok(())
        }

        async fn create_connector_service(
            &self,
            _name: &str,
            _connection_params: &BTreeMap<String, String>,
        ) -> Result<(), ManagementError> {
            Ok(())
        }

        async fn destroy_connector_service(&self, _name: &str) -> Result<(), ManagementError> {
            Ok(())
        }

        async fn create_divert(
            &self,
            name: &str,
            _routing_name: &str,
            _address: &str,
            forwarding_address: &str,
        ) -> Result<(), ManagementError> {
            self.diverts
                .lock()
                .unwrap()
                .insert(name.to_string(), forwarding_address.to_string());
            Ok(())
        }

        async fn destroy_divert(&self, name: &str) -> Result<(), ManagementError> {
            self.record(format!("destroyDivert({name})"));
            self.diverts.lock().unwrap().remove(name);
            Ok(())
        }

        async fn get_queue_names(&self) -> Result<BTreeSet<String>, ManagementError> {
            let delay = *self.read_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Some(err) = self.fail_reads.lock().unwrap().clone() {
                return Err(err);
            }
            Ok(self.queues.lock().unwrap().clone())
        }

        async fn get_divert_names(&self) -> Result<BTreeSet<String>, ManagementError> {
            Ok(self.diverts.lock().unwrap().keys().cloned().collect())
        }

        async fn get_queue_message_count(&self, _queue_name: &str) -> Result<i64, ManagementError> {
            Ok(0)
        }

        async fn get_queue_address(&self, queue_name: &str) -> Result<String, ManagementError> {
            Ok(queue_name.to_string())
        }

        async fn get_divert_routing_name(&self, divert_name: &str) -> Result<String, ManagementError> {
            Ok(divert_name.to_string())
        }

        async fn get_divert_address(&self, divert_name: &str) -> Result<String, ManagementError> {
            Ok(divert_name.to_string())
        }

        async fn get_divert_forwarding_address(
            &self,
            divert_name: &str,
        ) -> Result<String, ManagementError> {
            Ok(self
                .diverts
                .lock()
                .unwrap()
                .get(divert_name)
                .cloned()
                .unwrap_or_default())
        }

        async fn force_shutdown(&self) -> Result<(), ManagementError> {
            Ok(())
        }

        async fn close(&self) {
            self.record("close".to_string());
        }
    }

    #[derive(Default)]
    struct Brokers {
        by_cluster: Mutex<HashMap<String, Arc<RecordingBroker>>>,
        connects: Mutex<Vec<String>>,
    }

    impl Brokers {
        fn add(&self, cluster_id: &str, broker: Arc<RecordingBroker>) {
            self.by_cluster
                .lock()
                .unwrap()
                .insert(cluster_id.to_string(), broker);
        }

        fn connects(&self) -> Vec<String> {
            self.connects.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BrokerClientFactory for Brokers {
        async fn connect(
            &self,
            cluster_id: &str,
        ) -> Result<Arc<dyn BrokerOperations>, ManagementError> {
            self.connects.lock().unwrap().push(cluster_id.to_string());
            match self.by_cluster.lock().unwrap().get(cluster_id) {
                Some(broker) => Ok(broker.clone() as Arc<dyn BrokerOperations>),
                None => Err(ManagementError::Closed {
                    broker: cluster_id.to_string(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct Directory {
        ready: Mutex<BTreeSet<String>>,
        unauthorized: Mutex<bool>,
        lists: Mutex<u32>,
    }

    impl Directory {
        fn ready(clusters: &[&str]) -> Arc<Self> {
            let directory = Self::default();
            *directory.ready.lock().unwrap() = clusters.iter().map(|c| c.to_string()).collect();
            Arc::new(directory)
        }

        fn mark_ready(&self, cluster_id: &str) {
            self.ready.lock().unwrap().insert(cluster_id.to_string());
        }
    }

    #[async_trait]
    impl ClusterResourceManager for Directory {
        async fn list_clusters(&self) -> Result<Vec<AddressCluster>, ClusterError> {
            *self.lists.lock().unwrap() += 1;
            if *self.unauthorized.lock().unwrap() {
                return Err(ClusterError::Unauthorized("forbidden".to_string()));
            }
            Ok(self
                .ready
                .lock()
                .unwrap()
                .iter()
                .map(|cluster_id| AddressCluster {
                    cluster_id: cluster_id.clone(),
                    resources: vec![ClusterResource {
                        kind: "Deployment".to_string(),
                        name: cluster_id.clone(),
                        unavailable_replicas: Some(0),
                    }],
                })
                .collect())
        }
    }

    fn queues(names: &[(&str, &str)]) -> Vec<Address> {
        names
            .iter()
            .map(|(name, plan)| Address::new(name, AddressType::Queue, Plan::named(plan)))
            .collect()
    }

    async fn next_report(reports: &mut tokio::sync::watch::Receiver<PassReport>) -> PassReport {
        reports.changed().await.unwrap();
        reports.borrow_and_update().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn deploys_missing_then_destroys_surplus() {
        let broker = RecordingBroker::with_queues(&["q2", "q3"]);
        let brokers = Arc::new(Brokers::default());
        brokers.add("pooled-small", broker.clone());
        let reconciler = Reconciler::start(Directory::ready(&["pooled-small"]), brokers);
        let mut reports = reconciler.subscribe_reports();

        reconciler.submit(classify(&queues(&[("q1", "pooled-small"), ("q2", "pooled-small")])));
        let report = next_report(&mut reports).await;

        assert_eq!(broker.calls(), vec!["deployQueue(q1)", "destroyQueue(q3)"]);
        assert_eq!(report.pass, 1);
        assert_eq!(report.applied["pooled-small"].len(), 2);
        assert!(report.is_clean());

        reconciler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn diverts_into_destroyed_queue_go_first() {
        let broker = RecordingBroker::with_queues(&["q1", "q3"]);
        broker
            .create_divert("mirror-q3", "mirror", "q1", "q3")
            .await
            .unwrap();
        let brokers = Arc::new(Brokers::default());
        brokers.add("pooled-small", broker.clone());
        let reconciler = Reconciler::start(Directory::ready(&["pooled-small"]), brokers);
        let mut reports = reconciler.subscribe_reports();

        reconciler.submit(classify(&queues(&[("q1", "pooled-small")])));
        next_report(&mut reports).await;

        assert_eq!(
            broker.calls(),
            vec!["destroyDivert(mirror-q3)", "destroyQueue(q3)"]
        );
        reconciler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unready_cluster_is_deferred_until_readiness_changes() {
        let broker = RecordingBroker::with_queues(&[]);
        let brokers = Arc::new(Brokers::default());
        brokers.add("q1", broker.clone());
        let directory = Directory::ready(&[]);
        let reconciler = Reconciler::start(directory.clone(), brokers.clone());
        let mut reports = reconciler.subscribe_reports();

        reconciler.submit(classify(&queues(&[("q1", "dedicated")])));
        let report = next_report(&mut reports).await;
        assert_eq!(report.deferred.keys().collect::<Vec<_>>(), vec!["q1"]);
        assert!(brokers.connects().is_empty());

        directory.mark_ready("q1");
        reconciler.readiness_changed();
        let report = next_report(&mut reports).await;

        assert_eq!(report.pass, 2);
        assert_eq!(
            report.applied["q1"],
            vec![ReconcileAction::DeployQueue {
                name: "q1".to_string(),
                address: "q1".to_string()
            }]
        );
        reconciler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn directory_errors_defer_instead_of_failing() {
        let directory = Directory::ready(&["q1"]);
        *directory.unauthorized.lock().unwrap() = true;
        let reconciler = Reconciler::start(directory, Arc::new(Brokers::default()));
        let mut reports = reconciler.subscribe_reports();

        reconciler.submit(classify(&queues(&[("q1", "dedicated")])));
        let report = next_report(&mut reports).await;

        assert!(report.deferred["q1"].contains("forbidden"));
        assert!(report.failed.is_empty());
        reconciler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn one_broker_failing_does_not_block_others() {
        let healthy = RecordingBroker::with_queues(&[]);
        let timing_out = RecordingBroker::with_queues(&[]);
        *timing_out.fail_reads.lock().unwrap() = Some(ManagementError::Timeout {
            broker: "broker-q2".to_string(),
            target: "broker.getQueueNames".to_string(),
            params: "[]".to_string(),
        });
        let brokers = Arc::new(Brokers::default());
        brokers.add("q1", healthy.clone());
        brokers.add("q2", timing_out.clone());
        let reconciler = Reconciler::start(Directory::ready(&["q1", "q2"]), brokers.clone());
        let mut reports = reconciler.subscribe_reports();

        let snapshot = classify(&queues(&[("q1", "dedicated"), ("q2", "dedicated")]));
        reconciler.submit(snapshot.clone());
        let report = next_report(&mut reports).await;

        assert_eq!(healthy.calls(), vec!["deployQueue(q1)"]);
        assert!(matches!(
            report.failed["q2"],
            ReconcileError::Broker {
                source: ManagementError::Timeout { .. },
                ..
            }
        ));
        assert_eq!(timing_out.calls(), vec!["close"]);

        *timing_out.fail_reads.lock().unwrap() = None;
        reconciler.submit(snapshot);
        let report = next_report(&mut reports).await;

        assert!(report.is_clean());
        assert_eq!(
            brokers.connects().iter().filter(|c| *c == "q2").count(),
            2
        );
        assert_eq!(brokers.connects().iter().filter(|c| *c == "q1").count(), 1);
        reconciler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn snapshots_arriving_mid_pass_coalesce() {
        let broker = RecordingBroker::with_queues(&[]);
        *broker.read_delay.lock().unwrap() = Duration::from_secs(5);
        let brokers = Arc::new(Brokers::default());
        brokers.add("pooled-small", broker.clone());
        let reconciler = Reconciler::start(Directory::ready(&["pooled-small"]), brokers);
        let mut reports = reconciler.subscribe_reports();

        reconciler.submit(classify(&queues(&[("q1", "pooled-small")])));
        tokio::task::yield_now().await;
        reconciler.submit(classify(&queues(&[("q2", "pooled-small")])));
        reconciler.submit(classify(&queues(&[("q3", "pooled-small")])));

        let first = next_report(&mut reports).await;
        let second = next_report(&mut reports).await;

        assert_eq!(first.pass, 1);
        assert_eq!(second.pass, 2);
        assert_eq!(
            broker.calls(),
            vec!["deployQueue(q1)", "deployQueue(q3)", "destroyQueue(q1)"]
        );
        reconciler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_closes_pooled_clients() {
        let broker = RecordingBroker::with_queues(&["q1"]);
        let brokers = Arc::new(Brokers::default());
        brokers.add("q1", broker.clone());
        let reconciler = Reconciler::start(Directory::ready(&["q1"]), brokers);
        let mut reports = reconciler.subscribe_reports();
        reconciler.submit(classify(&queues(&[("q1", "dedicated")])));
        next_report(&mut reports).await;

        reconciler.stop().await;
        reconciler.stop().await;

        assert_eq!(broker.calls(), vec!["close"]);
    }

    #[tokio::test(start_paused = true)]
    async fn client_of_departed_cluster_is_closed_without_teardown() {
        let broker = RecordingBroker::with_queues(&[]);
        let brokers = Arc::new(Brokers::default());
        brokers.add("q1", broker.clone());
        let reconciler = Reconciler::start(Directory::ready(&["q1"]), brokers.clone());
        let mut reports = reconciler.subscribe_reports();

        reconciler.submit(classify(&queues(&[("q1", "dedicated")])));
        next_report(&mut reports).await;
        reconciler.submit(BTreeMap::new());
        let report = next_report(&mut reports).await;

        assert_eq!(report.pass, 2);
        assert!(report.applied.is_empty());
        assert_eq!(broker.calls(), vec!["deployQueue(q1)", "close"]);

        reconciler.stop().await;
        assert_eq!(broker.calls(), vec!["deployQueue(q1)", "close"]);
        assert_eq!(brokers.connects(), vec!["q1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn directory_is_listed_once_per_pass() {
        let brokers = Arc::new(Brokers::default());
        for cluster_id in ["q1", "q2", "q3"] {
            brokers.add(cluster_id, RecordingBroker::with_queues(&[]));
        }
        let directory = Directory::ready(&["q1", "q2", "q3"]);
        let reconciler = Reconciler::start(directory.clone(), brokers);
        let mut reports = reconciler.subscribe_reports();

        reconciler.submit(classify(&queues(&[
            ("q1", "dedicated"),
            ("q2", "dedicated"),
            ("q3", "dedicated"),
        ])));
        let report = next_report(&mut reports).await;

        assert_eq!(report.applied.len(), 3);
        assert_eq!(*directory.lists.lock().unwrap(), 1);
        reconciler.stop().await;
    }
}
