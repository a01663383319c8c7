// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scan Session
 * Top-level orchestrator: lifecycle state machine, host fan-out,
 * aggregate progress and counters, alert sink and ephemeral
 * transaction bookkeeping
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dependency::execution_order;
use crate::errors::{EngineError, EngineResult};
use crate::events::{EventBus, ScanEvent};
use crate::host_process::{HostProcess, HostUpdate, PlannedPlugin, ScanControls};
use crate::metrics::ScanMetrics;
use crate::plugin::{AlertSink, Plugin, PluginConfig};
use crate::progress::ProgressEstimator;
use crate::registry::PluginRegistry;
use crate::transport::{HttpTransport, SiteProvider, TransactionRecord, TransactionStore};
use crate::types::{Alert, ScanState, ScanTarget};

struct SessionInner {
    state: parking_lot::RwLock<ScanState>,
    controls: parking_lot::RwLock<Arc<ScanControls>>,
    events: Arc<EventBus>,
    metrics: Arc<ScanMetrics>,
    estimator: parking_lot::Mutex<ProgressEstimator>,
    /// Append-only during a run; only ever emptied as one cleanup batch.
    ephemeral_ids: parking_lot::Mutex<Vec<Uuid>>,
    alert_count: AtomicU64,
    request_count: AtomicU64,
    time_started: parking_lot::RwLock<Option<DateTime<Utc>>>,
    time_finished: parking_lot::RwLock<Option<DateTime<Utc>>>,
    store: Arc<dyn TransactionStore>,
}

impl SessionInner {
    fn transition(&self, to: ScanState) {
        let from = {
            let mut state = self.state.write();
            let from = *state;
            *state = to;
            from
        };
        debug!("[ScanSession] {} -> {}", from, to);
        self.events.publish(ScanEvent::StateChanged { state: to });
    }

    /// Final transition once every host has reported completion.
    fn finish_run(&self) {
        let final_state = if *self.state.read() == ScanState::Stopping {
            ScanState::Stopped
        } else {
            ScanState::Completed
        };
        if final_state == ScanState::Completed {
            self.estimator.lock().finish();
        }
        *self.time_finished.write() = Some(Utc::now());
        self.transition(final_state);
        info!(
            "[ScanSession] scan finished as {} ({} alerts, {} requests)",
            final_state,
            self.alert_count.load(Ordering::Relaxed),
            self.request_count.load(Ordering::Relaxed)
        );
    }
}

#[async_trait]
impl AlertSink for SessionInner {
    async fn raise_alert(&self, alert: Alert) {
        self.alert_count.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_alert();
        info!(
            "[ScanSession] alert: {} ({}) at {}",
            alert.name, alert.risk, alert.uri
        );
        self.events.publish(ScanEvent::AlertRaised { alert });
    }

    async fn notify_message(&self, record: TransactionRecord) -> EngineResult<Option<Uuid>> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_request();

        if record.id.is_some() {
            // already durably persisted by the transport layer
            return Ok(None);
        }

        let id = self.store.persist_ephemeral(&record).await?;
        self.ephemeral_ids.lock().push(id);
        self.metrics.record_persisted();
        Ok(Some(id))
    }
}

/// One active scan against one target.
///
/// Collaborators are injected at construction; the session never reaches
/// for ambient global state. All lifecycle operations are safe to call
/// from any task.
pub struct ScanSession {
    registry: Arc<PluginRegistry>,
    transport: Arc<dyn HttpTransport>,
    sites: Arc<dyn SiteProvider>,
    inner: Arc<SessionInner>,
}

impl ScanSession {
    pub fn new(
        registry: Arc<PluginRegistry>,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn TransactionStore>,
        sites: Arc<dyn SiteProvider>,
    ) -> Self {
        Self {
            registry,
            transport,
            sites,
            inner: Arc::new(SessionInner {
                state: parking_lot::RwLock::new(ScanState::NotStarted),
                controls: parking_lot::RwLock::new(Arc::new(ScanControls::new())),
                events: Arc::new(EventBus::new()),
                metrics: Arc::new(ScanMetrics::new()),
                estimator: parking_lot::Mutex::new(ProgressEstimator::new()),
                ephemeral_ids: parking_lot::Mutex::new(Vec::new()),
                alert_count: AtomicU64::new(0),
                request_count: AtomicU64::new(0),
                time_started: parking_lot::RwLock::new(None),
                time_finished: parking_lot::RwLock::new(None),
                store,
            }),
        }
    }

    /// Resolve the target and launch one host process per in-scope host.
    ///
    /// Validation is synchronous: a bad lifecycle state or a dependency
    /// cycle fails here and nothing is scheduled. The scan itself runs
    /// in the background; poll `progress()` or drain `subscribe()`.
    pub async fn start(&self, target: ScanTarget) -> EngineResult<()> {
        {
            let state = *self.inner.state.read();
            if !state.can_start() {
                return Err(EngineError::AlreadyRunning { state });
            }
        }

        let hosts = self.sites.hosts_in_scope(&target).await?;
        let enabled = self.registry.all_enabled_for(&target);
        let plugins: Vec<Arc<dyn Plugin>> =
            enabled.iter().map(|(p, _)| Arc::clone(p)).collect();
        let ordered = execution_order(&plugins)?;

        let configs: HashMap<u32, PluginConfig> = enabled
            .iter()
            .map(|(p, c)| (p.descriptor().id, c.clone()))
            .collect();
        let plan: Vec<PlannedPlugin> = ordered
            .iter()
            .map(|plugin| {
                let config = configs
                    .get(&plugin.descriptor().id)
                    .cloned()
                    .unwrap_or_default();
                let weight = plugin.descriptor().weight(config.strength);
                PlannedPlugin {
                    plugin: Arc::clone(plugin),
                    config,
                    weight,
                }
            })
            .collect();

        let policy = self.registry.policy();

        // claim the session before spawning anything
        {
            let mut state = self.inner.state.write();
            if !state.can_start() {
                return Err(EngineError::AlreadyRunning { state: *state });
            }
            *state = ScanState::Running;
        }
        self.inner
            .events
            .publish(ScanEvent::StateChanged {
                state: ScanState::Running,
            });

        info!(
            "[ScanSession] starting scan of '{}': {} hosts, {} plugins",
            target.name,
            hosts.len(),
            plan.len()
        );

        let controls = Arc::new(ScanControls::new());
        *self.inner.controls.write() = Arc::clone(&controls);
        self.inner.alert_count.store(0, Ordering::Relaxed);
        self.inner.request_count.store(0, Ordering::Relaxed);
        self.inner.metrics.reset();
        {
            let mut estimator = self.inner.estimator.lock();
            estimator.reset();
            let host_weight: u64 = plan.iter().map(|p| p.weight).sum();
            for _ in &hosts {
                estimator.add_work(host_weight.max(1));
            }
        }
        *self.inner.time_started.write() = Some(Utc::now());
        *self.inner.time_finished.write() = None;

        if hosts.is_empty() || plan.is_empty() {
            warn!(
                "[ScanSession] nothing to scan for '{}' ({} hosts, {} plugins)",
                target.name,
                hosts.len(),
                plan.len()
            );
            self.inner.finish_run();
            return Ok(());
        }

        let watchdog = if policy.plugin_watchdog_secs > 0 {
            Some(Duration::from_secs(policy.plugin_watchdog_secs))
        } else {
            None
        };

        let sink: Arc<dyn AlertSink> = self.inner.clone();
        let (update_tx, update_rx) = mpsc::unbounded_channel::<HostUpdate>();

        let mut handles = Vec::with_capacity(hosts.len());
        for host in &hosts {
            let process = HostProcess::new(
                host.clone(),
                plan.clone(),
                policy.host_workers,
                watchdog,
                policy.plugin_rps,
                Arc::clone(&controls),
                Arc::clone(&self.transport),
                Arc::clone(&sink),
                Arc::clone(&self.inner.events),
                update_tx.clone(),
            );
            handles.push(tokio::spawn(process.run()));
        }
        drop(update_tx);

        let inner = Arc::clone(&self.inner);
        let host_total = hosts.len();
        tokio::spawn(async move {
            let mut update_rx = update_rx;
            let mut hosts_done = 0usize;
            while let Some(update) = update_rx.recv().await {
                match update {
                    HostUpdate::PluginSettled { state, weight, .. } => {
                        inner.metrics.record_plugin_settled(state);
                        inner.estimator.lock().complete_work(weight);
                    }
                    HostUpdate::Completed { host } => {
                        hosts_done += 1;
                        debug!(
                            "[ScanSession] host {} complete ({}/{})",
                            host, hosts_done, host_total
                        );
                        if hosts_done == host_total {
                            break;
                        }
                    }
                }
            }
            futures::future::join_all(handles).await;
            inner.finish_run();
        });

        Ok(())
    }

    /// Gate new plugin launches across every host. Idempotent.
    pub fn pause(&self) -> EngineResult<()> {
        let state = *self.inner.state.read();
        match state {
            ScanState::Running => {
                self.inner.controls.read().pause();
                self.inner.transition(ScanState::Paused);
                info!("[ScanSession] paused");
                Ok(())
            }
            ScanState::Paused => Ok(()),
            _ => Err(EngineError::InvalidTransition {
                from: state,
                op: "pause",
            }),
        }
    }

    /// Lift the pause gate. Idempotent.
    pub fn resume(&self) -> EngineResult<()> {
        let state = *self.inner.state.read();
        match state {
            ScanState::Paused => {
                self.inner.controls.read().resume();
                self.inner.transition(ScanState::Running);
                info!("[ScanSession] resumed");
                Ok(())
            }
            ScanState::Running => Ok(()),
            _ => Err(EngineError::InvalidTransition {
                from: state,
                op: "resume",
            }),
        }
    }

    /// Request cooperative cancellation. The session stays in STOPPING
    /// until every host process has drained its in-flight plugins.
    pub fn stop(&self) -> EngineResult<()> {
        let state = *self.inner.state.read();
        match state {
            ScanState::Running | ScanState::Paused => {
                let controls = Arc::clone(&self.inner.controls.read());
                controls.cancel();
                self.inner.transition(ScanState::Stopping);
                info!("[ScanSession] stopping");
                Ok(())
            }
            ScanState::Stopping | ScanState::Stopped | ScanState::Completed => Ok(()),
            ScanState::NotStarted => Err(EngineError::InvalidTransition {
                from: state,
                op: "stop",
            }),
        }
    }

    /// Return a terminal session to NOT_STARTED.
    ///
    /// When the delete-on-reset policy is set, the ephemeral record ids
    /// accumulated over the run are deleted in exactly one batch. A
    /// failed batch delete is surfaced as `Cleanup` but the session
    /// still resets; stale records are a reported side effect, not a
    /// blocking failure.
    pub async fn reset(&self) -> EngineResult<()> {
        let state = *self.inner.state.read();
        if state.is_active() {
            return Err(EngineError::InvalidTransition {
                from: state,
                op: "reset",
            });
        }

        let ids: Vec<Uuid> = std::mem::take(&mut *self.inner.ephemeral_ids.lock());
        let mut cleanup_err = None;

        let policy = self.registry.policy();
        if policy.delete_records_on_reset && !ids.is_empty() {
            info!(
                "[ScanSession] deleting {} ephemeral transaction records",
                ids.len()
            );
            if let Err(e) = self.inner.store.delete_batch(&ids).await {
                warn!("[ScanSession] ephemeral cleanup failed: {e}");
                cleanup_err = Some(EngineError::Cleanup {
                    failed: ids.len(),
                    total: ids.len(),
                    reason: e.to_string(),
                });
            }
        }

        self.inner.alert_count.store(0, Ordering::Relaxed);
        self.inner.request_count.store(0, Ordering::Relaxed);
        self.inner.metrics.reset();
        self.inner.estimator.lock().reset();
        *self.inner.time_started.write() = None;
        *self.inner.time_finished.write() = None;
        self.inner.transition(ScanState::NotStarted);

        match cleanup_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn state(&self) -> ScanState {
        *self.inner.state.read()
    }

    /// Aggregate completion percentage, monotonically non-decreasing
    /// while the scan runs.
    pub fn progress(&self) -> u8 {
        self.inner.estimator.lock().percent()
    }

    pub fn alert_count(&self) -> u64 {
        self.inner.alert_count.load(Ordering::Relaxed)
    }

    pub fn total_requests(&self) -> u64 {
        self.inner.request_count.load(Ordering::Relaxed)
    }

    pub fn time_started(&self) -> Option<DateTime<Utc>> {
        *self.inner.time_started.read()
    }

    pub fn time_finished(&self) -> Option<DateTime<Utc>> {
        *self.inner.time_finished.read()
    }

    /// Number of ephemeral record ids currently tracked for cleanup.
    pub fn tracked_ephemeral_records(&self) -> usize {
        self.inner.ephemeral_ids.lock().len()
    }

    pub fn metrics(&self) -> Arc<ScanMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    /// Register a listener; every scan event is delivered to every
    /// receiver obtained here.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ScanEvent> {
        self.inner.events.subscribe()
    }
}
