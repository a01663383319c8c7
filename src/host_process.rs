// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Host Process
 * Runs the ordered plugin plan against one host with a bounded worker
 * pool, cooperative pause/cancel and a per-plugin watchdog
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::events::{EventBus, ScanEvent};
use crate::plugin::{AlertSink, Plugin, PluginConfig, ScanContext};
use crate::transport::HttpTransport;
use crate::types::PluginState;

/// Shared pause/cancel flags for one scan run.
///
/// Both are cooperative: pause gates new plugin launches, cancel is
/// checked before each launch and between the requests a plugin issues.
/// Nothing is ever force-killed.
#[derive(Debug, Default)]
pub struct ScanControls {
    paused: AtomicBool,
    cancelled: AtomicBool,
}

impl ScanControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Block while paused; a cancel lifts the gate so stop can drain.
    pub async fn wait_if_paused(&self) {
        while self.is_paused() && !self.is_cancelled() {
            sleep(Duration::from_millis(50)).await;
        }
    }
}

/// One plugin in a host's execution plan with its resolved config
/// snapshot and progress weight.
#[derive(Clone)]
pub struct PlannedPlugin {
    pub plugin: Arc<dyn Plugin>,
    pub config: PluginConfig,
    pub weight: u64,
}

/// What a host process reports back to its session.
#[derive(Debug, Clone)]
pub enum HostUpdate {
    PluginSettled {
        host: String,
        plugin_id: u32,
        state: PluginState,
        weight: u64,
    },
    Completed {
        host: String,
    },
}

struct PluginOutcome {
    plugin_id: u32,
    plugin_name: String,
    state: PluginState,
    duration_ms: u64,
    weight: u64,
}

/// Scheduler for one target host.
///
/// Launch order always respects the topological order of the plan: a
/// plugin is launched only once every dependency present in the plan has
/// settled (DONE or ERROR; a failed dependency does not block downstream
/// plugins). Scheduling decisions never block on plugin I/O; completions
/// arrive over a channel.
pub struct HostProcess {
    host: String,
    plan: Vec<PlannedPlugin>,
    workers: usize,
    watchdog: Option<Duration>,
    rps: Option<u32>,
    controls: Arc<ScanControls>,
    transport: Arc<dyn HttpTransport>,
    sink: Arc<dyn AlertSink>,
    events: Arc<EventBus>,
    updates: mpsc::UnboundedSender<HostUpdate>,
}

impl HostProcess {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        host: String,
        plan: Vec<PlannedPlugin>,
        workers: usize,
        watchdog: Option<Duration>,
        rps: Option<u32>,
        controls: Arc<ScanControls>,
        transport: Arc<dyn HttpTransport>,
        sink: Arc<dyn AlertSink>,
        events: Arc<EventBus>,
        updates: mpsc::UnboundedSender<HostUpdate>,
    ) -> Self {
        Self {
            host,
            plan,
            workers,
            watchdog,
            rps,
            controls,
            transport,
            sink,
            events,
            updates,
        }
    }

    /// Drive the host to completion. Reports `HostUpdate::Completed`
    /// exactly once, when every plugin has settled or the scan was
    /// cancelled with no work in flight.
    pub(crate) async fn run(self) {
        let total = self.plan.len();
        let total_weight: u64 = self.plan.iter().map(|p| p.weight).sum::<u64>().max(1);
        info!(
            "[HostProcess] {}: scanning with {} plugins, {} workers",
            self.host, total, self.workers
        );
        let started = Instant::now();

        let semaphore = Arc::new(Semaphore::new(self.workers.max(1)));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<PluginOutcome>();

        let mut states: HashMap<u32, PluginState> = self
            .plan
            .iter()
            .map(|p| (p.plugin.descriptor().id, PluginState::Pending))
            .collect();
        let mut settled = 0usize;
        let mut settled_weight = 0u64;

        loop {
            while let Ok(outcome) = done_rx.try_recv() {
                self.settle(
                    outcome,
                    &mut states,
                    &mut settled,
                    &mut settled_weight,
                    total_weight,
                );
            }
            if settled == total {
                break;
            }

            if self.controls.is_cancelled() {
                if !has_running(&states) {
                    break;
                }
                match done_rx.recv().await {
                    Some(outcome) => {
                        self.settle(
                            outcome,
                            &mut states,
                            &mut settled,
                            &mut settled_weight,
                            total_weight,
                        );
                        continue;
                    }
                    None => break,
                }
            }

            self.controls.wait_if_paused().await;

            match self.next_runnable(&states) {
                Some(planned) => {
                    let permit = match Arc::clone(&semaphore).acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    // the pool may have been full for a while; re-check the
                    // flags right before the launch
                    self.controls.wait_if_paused().await;
                    if self.controls.is_cancelled() {
                        drop(permit);
                        continue;
                    }
                    let descriptor = planned.plugin.descriptor();
                    debug!(
                        "[HostProcess] {}: launching plugin {} ({})",
                        self.host, descriptor.id, descriptor.name
                    );
                    states.insert(descriptor.id, PluginState::Running);
                    self.spawn_plugin(planned, permit, done_tx.clone());
                }
                None => {
                    if !has_running(&states) {
                        // unreachable with a topologically ordered plan
                        warn!(
                            "[HostProcess] {}: nothing runnable and nothing running, aborting host",
                            self.host
                        );
                        break;
                    }
                    match done_rx.recv().await {
                        Some(outcome) => self.settle(
                            outcome,
                            &mut states,
                            &mut settled,
                            &mut settled_weight,
                            total_weight,
                        ),
                        None => break,
                    }
                }
            }
        }

        info!(
            "[HostProcess] {}: complete in {:?} ({}/{} plugins settled)",
            self.host,
            started.elapsed(),
            settled,
            total
        );
        self.events.publish(ScanEvent::HostCompleted {
            host: self.host.clone(),
        });
        let _ = self.updates.send(HostUpdate::Completed {
            host: self.host.clone(),
        });
    }

    /// First pending plugin, in plan order, whose in-plan dependencies
    /// have all settled. Dependencies outside the plan were reported and
    /// discharged by the resolver.
    fn next_runnable(&self, states: &HashMap<u32, PluginState>) -> Option<PlannedPlugin> {
        self.plan
            .iter()
            .find(|planned| {
                let descriptor = planned.plugin.descriptor();
                if states.get(&descriptor.id) != Some(&PluginState::Pending) {
                    return false;
                }
                descriptor.dependencies.iter().all(|dep_name| {
                    self.plan
                        .iter()
                        .find(|other| other.plugin.descriptor().name == *dep_name)
                        .map_or(true, |other| {
                            states
                                .get(&other.plugin.descriptor().id)
                                .map_or(true, |state| state.is_settled())
                        })
                })
            })
            .cloned()
    }

    fn spawn_plugin(
        &self,
        planned: PlannedPlugin,
        permit: OwnedSemaphorePermit,
        done_tx: mpsc::UnboundedSender<PluginOutcome>,
    ) {
        let descriptor = planned.plugin.descriptor();
        let plugin_id = descriptor.id;
        let plugin_name = descriptor.name.clone();
        let weight = planned.weight;
        let host = self.host.clone();
        let watchdog = self.watchdog;

        let ctx = ScanContext::new(
            host.clone(),
            plugin_id,
            planned.config.clone(),
            self.rps,
            Arc::clone(&self.transport),
            Arc::clone(&self.sink),
            Arc::clone(&self.controls),
        );
        let plugin = Arc::clone(&planned.plugin);

        tokio::spawn(async move {
            let started = Instant::now();

            // the plugin body gets its own task so a panic is isolated
            // from the pool
            let body = tokio::spawn(async move { plugin.scan(&ctx).await });

            let joined = match watchdog {
                Some(limit) => match timeout(limit, body).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!(
                            "[HostProcess] {}: plugin {} exceeded watchdog of {:?}, marking ERROR",
                            host, plugin_name, limit
                        );
                        // the straggler keeps its cancel flag; the pool moves on
                        drop(permit);
                        let _ = done_tx.send(PluginOutcome {
                            plugin_id,
                            plugin_name,
                            state: PluginState::Error,
                            duration_ms: started.elapsed().as_millis() as u64,
                            weight,
                        });
                        return;
                    }
                },
                None => body.await,
            };

            let state = match joined {
                Ok(Ok(())) => PluginState::Done,
                Ok(Err(e)) => {
                    warn!(
                        "[HostProcess] {}: plugin {} failed: {:#}",
                        host, plugin_name, e
                    );
                    PluginState::Error
                }
                Err(join_err) => {
                    error!(
                        "[HostProcess] {}: plugin {} panicked: {}",
                        host, plugin_name, join_err
                    );
                    PluginState::Error
                }
            };

            drop(permit);
            let _ = done_tx.send(PluginOutcome {
                plugin_id,
                plugin_name,
                state,
                duration_ms: started.elapsed().as_millis() as u64,
                weight,
            });
        });
    }

    fn settle(
        &self,
        outcome: PluginOutcome,
        states: &mut HashMap<u32, PluginState>,
        settled: &mut usize,
        settled_weight: &mut u64,
        total_weight: u64,
    ) {
        // only the first outcome for a plugin counts
        if states.get(&outcome.plugin_id) != Some(&PluginState::Running) {
            return;
        }

        states.insert(outcome.plugin_id, outcome.state);
        *settled += 1;
        *settled_weight += outcome.weight;
        let percent = (*settled_weight * 100 / total_weight).min(100) as u8;

        debug!(
            "[HostProcess] {}: plugin {} settled as {} after {}ms ({percent}%)",
            self.host, outcome.plugin_name, outcome.state, outcome.duration_ms
        );

        self.events.publish(ScanEvent::PluginCompleted {
            host: self.host.clone(),
            plugin_id: outcome.plugin_id,
            plugin_name: outcome.plugin_name,
            state: outcome.state,
            duration_ms: outcome.duration_ms,
        });
        self.events.publish(ScanEvent::HostProgress {
            host: self.host.clone(),
            percent,
        });
        let _ = self.updates.send(HostUpdate::PluginSettled {
            host: self.host.clone(),
            plugin_id: outcome.plugin_id,
            state: outcome.state,
            weight: outcome.weight,
        });
    }
}

fn has_running(states: &HashMap<u32, PluginState>) -> bool {
    states.values().any(|state| *state == PluginState::Running)
}
