// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Engine Integration Tests
 * End-to-end tests for scan scheduling, lifecycle control and
 * ephemeral record cleanup
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use luotain::config::ScanPolicy;
use luotain::errors::{EngineError, EngineResult};
use luotain::events::ScanEvent;
use luotain::plugin::{Plugin, PluginConfig, PluginDescriptor, ScanContext};
use luotain::registry::PluginRegistry;
use luotain::session::ScanSession;
use luotain::transport::{
    HttpTransport, ScanRequest, ScanResponse, SiteProvider, TransactionRecord, TransactionStore,
};
use luotain::types::{
    Alert, AlertThreshold, Confidence, PluginCategory, PluginState, Risk, ScanState, ScanTarget,
};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

enum Behavior {
    /// Issue `requests` requests and raise `alerts` alerts
    Probe { requests: usize, alerts: usize },
    /// Fail with an error on every invocation
    Fail,
    /// Panic on every invocation
    Panic,
    /// Busy-wait in small slices, observing the cancel flag
    Slow(Duration),
}

/// Records the per-host launch order so tests can assert on scheduling.
type LaunchLog = Arc<Mutex<HashMap<String, Vec<u32>>>>;

struct TestPlugin {
    descriptor: PluginDescriptor,
    behavior: Behavior,
    log: LaunchLog,
}

#[async_trait]
impl Plugin for TestPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn scan(&self, ctx: &ScanContext) -> anyhow::Result<()> {
        self.log
            .lock()
            .entry(ctx.host().to_string())
            .or_default()
            .push(self.descriptor.id);

        match &self.behavior {
            Behavior::Probe { requests, alerts } => {
                for _ in 0..*requests {
                    if ctx.is_cancelled() {
                        return Ok(());
                    }
                    let url = Url::parse(&format!("https://{}/probe", ctx.host()))?;
                    ctx.send_request(ScanRequest::get(url)).await?;
                }
                for n in 0..*alerts {
                    ctx.raise_alert(
                        Alert::new(
                            self.descriptor.id,
                            format!("{} finding {}", self.descriptor.display_name, n),
                            Risk::Medium,
                            Confidence::Medium,
                            format!("https://{}/probe", ctx.host()),
                        )
                        .with_parameter("q"),
                    )
                    .await;
                }
                Ok(())
            }
            Behavior::Fail => anyhow::bail!("simulated plugin failure"),
            Behavior::Panic => panic!("simulated plugin panic"),
            Behavior::Slow(total) => {
                let mut waited = Duration::ZERO;
                while waited < *total {
                    if ctx.is_cancelled() {
                        return Ok(());
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    waited += Duration::from_millis(10);
                }
                Ok(())
            }
        }
    }
}

struct MockTransport;

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: &ScanRequest) -> EngineResult<ScanResponse> {
        Ok(ScanResponse {
            status: 200,
            headers: HashMap::new(),
            body: format!("ok: {}", request.url),
            elapsed_ms: 1,
        })
    }
}

#[derive(Default)]
struct MockStore {
    persisted: Mutex<Vec<Uuid>>,
    deleted_batches: Mutex<Vec<Vec<Uuid>>>,
    fail_delete: AtomicBool,
}

#[async_trait]
impl TransactionStore for MockStore {
    async fn persist_ephemeral(&self, _record: &TransactionRecord) -> EngineResult<Uuid> {
        let id = Uuid::new_v4();
        self.persisted.lock().push(id);
        Ok(id)
    }

    async fn delete_batch(&self, ids: &[Uuid]) -> EngineResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(EngineError::Transport("store unavailable".into()));
        }
        self.deleted_batches.lock().push(ids.to_vec());
        Ok(())
    }
}

struct FixedSites {
    hosts: Vec<String>,
}

#[async_trait]
impl SiteProvider for FixedSites {
    async fn hosts_in_scope(&self, _target: &ScanTarget) -> EngineResult<Vec<String>> {
        Ok(self.hosts.clone())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    registry: Arc<PluginRegistry>,
    store: Arc<MockStore>,
    session: ScanSession,
    log: LaunchLog,
}

fn harness(policy: ScanPolicy, hosts: &[&str]) -> Harness {
    let registry = Arc::new(PluginRegistry::new(policy));
    let store = Arc::new(MockStore::default());
    let store_handle: Arc<dyn TransactionStore> = store.clone();
    let session = ScanSession::new(
        Arc::clone(&registry),
        Arc::new(MockTransport),
        store_handle,
        Arc::new(FixedSites {
            hosts: hosts.iter().map(|h| h.to_string()).collect(),
        }),
    );
    Harness {
        registry,
        store,
        session,
        log: Arc::new(Mutex::new(HashMap::new())),
    }
}

impl Harness {
    fn add_plugin(&self, id: u32, name: &str, deps: &[&str], behavior: Behavior) {
        let descriptor = PluginDescriptor::new(id, name, name, PluginCategory::Injection)
            .with_dependencies(deps.iter().map(|d| d.to_string()).collect());
        self.registry
            .register(Arc::new(TestPlugin {
                descriptor,
                behavior,
                log: Arc::clone(&self.log),
            }))
            .expect("plugin registration failed");
    }

    fn launches(&self, host: &str) -> Vec<u32> {
        self.log.lock().get(host).cloned().unwrap_or_default()
    }
}

async fn wait_for_state(session: &ScanSession, expected: ScanState, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if session.state() == expected {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!(
                "timed out waiting for {}, state is {}",
                expected,
                session.state()
            );
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn drain_events(rx: &mut tokio::sync::mpsc::UnboundedReceiver<ScanEvent>) -> Vec<ScanEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn test_policy() -> ScanPolicy {
    ScanPolicy {
        plugin_watchdog_secs: 30,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_scan_completes_with_counts() {
    let h = harness(test_policy(), &["alpha.example.com", "beta.example.com"]);
    for (id, name) in [(1, "headers"), (2, "sqli"), (3, "xss")] {
        h.add_plugin(
            id,
            name,
            &[],
            Behavior::Probe {
                requests: 2,
                alerts: 1,
            },
        );
    }

    h.session.start(ScanTarget::new("example")).await.unwrap();
    wait_for_state(&h.session, ScanState::Completed, Duration::from_secs(5)).await;

    assert_eq!(h.session.progress(), 100);
    // 3 plugins x 1 alert x 2 hosts
    assert_eq!(h.session.alert_count(), 6);
    // 3 plugins x 2 requests x 2 hosts
    assert_eq!(h.session.total_requests(), 12);
    assert_eq!(h.session.tracked_ephemeral_records(), 12);
    assert_eq!(h.store.persisted.lock().len(), 12);
    assert!(h.session.time_started().is_some());
    assert!(h.session.time_finished().is_some());
    assert_eq!(h.session.metrics().plugins_completed(), 6);
    assert_eq!(h.session.metrics().plugins_failed(), 0);
}

#[tokio::test]
async fn dependency_order_respected_on_every_host() {
    // the concrete scenario: P1 alone first, P2/P3 free to run after,
    // pool size 2
    let policy = ScanPolicy {
        host_workers: 2,
        ..test_policy()
    };
    let h = harness(policy, &["alpha.example.com", "beta.example.com"]);
    h.add_plugin(
        1,
        "base",
        &[],
        Behavior::Probe {
            requests: 1,
            alerts: 0,
        },
    );
    h.add_plugin(
        2,
        "left",
        &["base"],
        Behavior::Probe {
            requests: 1,
            alerts: 0,
        },
    );
    h.add_plugin(
        3,
        "right",
        &["base"],
        Behavior::Probe {
            requests: 1,
            alerts: 0,
        },
    );

    h.session.start(ScanTarget::new("example")).await.unwrap();
    wait_for_state(&h.session, ScanState::Completed, Duration::from_secs(5)).await;

    for host in ["alpha.example.com", "beta.example.com"] {
        let launches = h.launches(host);
        assert_eq!(launches.len(), 3, "all plugins must run on {host}");
        assert_eq!(launches[0], 1, "dependency must launch first on {host}");
        let rest: HashSet<u32> = launches[1..].iter().copied().collect();
        assert_eq!(rest, HashSet::from([2, 3]));
    }
    assert_eq!(h.session.progress(), 100);
}

#[tokio::test]
async fn dependency_cycle_refuses_to_start() {
    let h = harness(test_policy(), &["alpha.example.com"]);
    h.add_plugin(
        1,
        "a",
        &["b"],
        Behavior::Probe {
            requests: 1,
            alerts: 0,
        },
    );
    h.add_plugin(
        2,
        "b",
        &["a"],
        Behavior::Probe {
            requests: 1,
            alerts: 0,
        },
    );

    let err = h.session.start(ScanTarget::new("example")).await.unwrap_err();
    assert!(matches!(err, EngineError::DependencyCycle { .. }));
    assert_eq!(h.session.state(), ScanState::NotStarted);
    assert!(h.launches("alpha.example.com").is_empty());
}

#[tokio::test]
async fn unknown_dependency_does_not_block() {
    let h = harness(test_policy(), &["alpha.example.com"]);
    h.add_plugin(
        1,
        "probe",
        &["not-registered"],
        Behavior::Probe {
            requests: 1,
            alerts: 0,
        },
    );

    h.session.start(ScanTarget::new("example")).await.unwrap();
    wait_for_state(&h.session, ScanState::Completed, Duration::from_secs(5)).await;
    assert_eq!(h.launches("alpha.example.com"), vec![1]);
}

#[tokio::test]
async fn failing_plugin_does_not_abort_the_host() {
    let h = harness(test_policy(), &["alpha.example.com"]);
    h.add_plugin(1, "broken", &[], Behavior::Fail);
    h.add_plugin(
        2,
        "healthy",
        &[],
        Behavior::Probe {
            requests: 1,
            alerts: 2,
        },
    );

    let mut events = h.session.subscribe();
    h.session.start(ScanTarget::new("example")).await.unwrap();
    wait_for_state(&h.session, ScanState::Completed, Duration::from_secs(5)).await;

    assert_eq!(h.session.progress(), 100);
    // the broken plugin contributes no alerts but is still accounted for
    assert_eq!(h.session.alert_count(), 2);
    assert_eq!(h.session.metrics().plugins_failed(), 1);
    assert_eq!(h.session.metrics().plugins_completed(), 1);

    let mut settled: HashMap<u32, PluginState> = HashMap::new();
    for event in drain_events(&mut events) {
        if let ScanEvent::PluginCompleted {
            plugin_id, state, ..
        } = event
        {
            settled.insert(plugin_id, state);
        }
    }
    assert_eq!(settled.get(&1), Some(&PluginState::Error));
    assert_eq!(settled.get(&2), Some(&PluginState::Done));
}

#[tokio::test]
async fn panicking_plugin_is_isolated() {
    let h = harness(test_policy(), &["alpha.example.com"]);
    h.add_plugin(1, "grenade", &[], Behavior::Panic);
    h.add_plugin(
        2,
        "healthy",
        &[],
        Behavior::Probe {
            requests: 1,
            alerts: 1,
        },
    );

    h.session.start(ScanTarget::new("example")).await.unwrap();
    wait_for_state(&h.session, ScanState::Completed, Duration::from_secs(5)).await;

    assert_eq!(h.session.progress(), 100);
    assert_eq!(h.session.alert_count(), 1);
    assert_eq!(h.session.metrics().plugins_failed(), 1);
}

#[tokio::test]
async fn failed_dependency_does_not_block_downstream() {
    let h = harness(test_policy(), &["alpha.example.com"]);
    h.add_plugin(1, "base", &[], Behavior::Fail);
    h.add_plugin(
        2,
        "downstream",
        &["base"],
        Behavior::Probe {
            requests: 1,
            alerts: 0,
        },
    );

    h.session.start(ScanTarget::new("example")).await.unwrap();
    wait_for_state(&h.session, ScanState::Completed, Duration::from_secs(5)).await;

    let launches = h.launches("alpha.example.com");
    assert_eq!(launches, vec![1, 2], "downstream must still run, after base");
}

#[tokio::test]
async fn off_threshold_plugin_never_runs() {
    let h = harness(test_policy(), &["alpha.example.com"]);
    h.add_plugin(
        1,
        "on",
        &[],
        Behavior::Probe {
            requests: 1,
            alerts: 0,
        },
    );
    h.add_plugin(
        2,
        "silenced",
        &[],
        Behavior::Probe {
            requests: 1,
            alerts: 5,
        },
    );
    h.registry.set_config(
        2,
        PluginConfig {
            enabled: true,
            threshold: AlertThreshold::Off,
            ..Default::default()
        },
    );

    h.session.start(ScanTarget::new("example")).await.unwrap();
    wait_for_state(&h.session, ScanState::Completed, Duration::from_secs(5)).await;

    assert_eq!(h.launches("alpha.example.com"), vec![1]);
    assert_eq!(h.session.alert_count(), 0);
    assert_eq!(h.session.progress(), 100);
}

#[tokio::test]
async fn watchdog_marks_stuck_plugin_as_error() {
    let policy = ScanPolicy {
        plugin_watchdog_secs: 1,
        ..Default::default()
    };
    let h = harness(policy, &["alpha.example.com"]);
    h.add_plugin(1, "stuck", &[], Behavior::Slow(Duration::from_secs(30)));
    h.add_plugin(
        2,
        "quick",
        &[],
        Behavior::Probe {
            requests: 1,
            alerts: 0,
        },
    );

    h.session.start(ScanTarget::new("example")).await.unwrap();
    wait_for_state(&h.session, ScanState::Completed, Duration::from_secs(10)).await;

    assert_eq!(h.session.progress(), 100);
    assert_eq!(h.session.metrics().plugins_failed(), 1);
    assert_eq!(h.session.metrics().plugins_completed(), 1);
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[tokio::test]
async fn progress_is_monotonically_non_decreasing() {
    let h = harness(test_policy(), &["alpha.example.com", "beta.example.com"]);
    for id in 1..=6 {
        h.add_plugin(
            id,
            &format!("probe-{id}"),
            &[],
            Behavior::Slow(Duration::from_millis(20)),
        );
    }

    h.session.start(ScanTarget::new("example")).await.unwrap();

    let mut samples = Vec::new();
    while h.session.state() != ScanState::Completed {
        samples.push(h.session.progress());
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    samples.push(h.session.progress());

    assert!(
        samples.windows(2).all(|w| w[0] <= w[1]),
        "progress went backwards: {samples:?}"
    );
    assert_eq!(*samples.last().unwrap(), 100);
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lifecycle_operations_reject_invalid_states() {
    let h = harness(test_policy(), &["alpha.example.com"]);

    assert!(matches!(
        h.session.pause(),
        Err(EngineError::InvalidTransition { op: "pause", .. })
    ));
    assert!(matches!(
        h.session.resume(),
        Err(EngineError::InvalidTransition { op: "resume", .. })
    ));
    assert!(matches!(
        h.session.stop(),
        Err(EngineError::InvalidTransition { op: "stop", .. })
    ));
}

#[tokio::test]
async fn starting_twice_is_rejected() {
    let h = harness(test_policy(), &["alpha.example.com"]);
    h.add_plugin(1, "slow", &[], Behavior::Slow(Duration::from_millis(300)));

    h.session.start(ScanTarget::new("example")).await.unwrap();
    let err = h.session.start(ScanTarget::new("example")).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyRunning { .. }));

    h.session.stop().unwrap();
    wait_for_state(&h.session, ScanState::Stopped, Duration::from_secs(5)).await;
}

#[tokio::test]
async fn pause_and_resume_complete_the_scan() {
    let policy = ScanPolicy {
        host_workers: 1,
        ..test_policy()
    };
    let h = harness(policy, &["alpha.example.com"]);
    for id in 1..=3 {
        h.add_plugin(
            id,
            &format!("slow-{id}"),
            &[],
            Behavior::Slow(Duration::from_millis(50)),
        );
    }

    h.session.start(ScanTarget::new("example")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    h.session.pause().unwrap();
    assert_eq!(h.session.state(), ScanState::Paused);
    // idempotent
    h.session.pause().unwrap();

    h.session.resume().unwrap();
    assert_eq!(h.session.state(), ScanState::Running);
    // idempotent
    h.session.resume().unwrap();

    wait_for_state(&h.session, ScanState::Completed, Duration::from_secs(5)).await;
    assert_eq!(h.session.progress(), 100);
    assert_eq!(h.launches("alpha.example.com").len(), 3);
}

#[tokio::test]
async fn pause_gates_new_plugin_launches() {
    let policy = ScanPolicy {
        host_workers: 1,
        ..test_policy()
    };
    let h = harness(policy, &["alpha.example.com"]);
    for id in 1..=4 {
        h.add_plugin(
            id,
            &format!("slow-{id}"),
            &[],
            Behavior::Slow(Duration::from_millis(60)),
        );
    }

    h.session.start(ScanTarget::new("example")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    h.session.pause().unwrap();

    // the running plugin finishes its unit of work; nothing new launches
    tokio::time::sleep(Duration::from_millis(200)).await;
    let launched_while_paused = h.launches("alpha.example.com").len();
    assert!(
        launched_while_paused <= 2,
        "pause must gate launches, saw {launched_while_paused}"
    );

    h.session.resume().unwrap();
    wait_for_state(&h.session, ScanState::Completed, Duration::from_secs(5)).await;
    assert_eq!(h.launches("alpha.example.com").len(), 4);
}

#[tokio::test]
async fn stop_cancels_cooperatively() {
    let policy = ScanPolicy {
        host_workers: 1,
        ..test_policy()
    };
    let h = harness(policy, &["alpha.example.com"]);
    for id in 1..=5 {
        h.add_plugin(
            id,
            &format!("slow-{id}"),
            &[],
            Behavior::Slow(Duration::from_millis(100)),
        );
    }

    h.session.start(ScanTarget::new("example")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    h.session.stop().unwrap();
    wait_for_state(&h.session, ScanState::Stopped, Duration::from_secs(5)).await;

    assert!(
        h.launches("alpha.example.com").len() < 5,
        "stop must prevent the remaining plugins from launching"
    );
    // stop in a terminal state is a no-op
    h.session.stop().unwrap();
}

#[tokio::test]
async fn stop_while_paused_still_drains() {
    let policy = ScanPolicy {
        host_workers: 1,
        ..test_policy()
    };
    let h = harness(policy, &["alpha.example.com"]);
    for id in 1..=3 {
        h.add_plugin(
            id,
            &format!("slow-{id}"),
            &[],
            Behavior::Slow(Duration::from_millis(80)),
        );
    }

    h.session.start(ScanTarget::new("example")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.session.pause().unwrap();
    h.session.stop().unwrap();

    wait_for_state(&h.session, ScanState::Stopped, Duration::from_secs(5)).await;
}

// ---------------------------------------------------------------------------
// Reset & ephemeral cleanup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reset_issues_exactly_one_batch_delete() {
    let h = harness(test_policy(), &["alpha.example.com"]);
    h.add_plugin(
        1,
        "probe",
        &[],
        Behavior::Probe {
            requests: 4,
            alerts: 0,
        },
    );

    h.session.start(ScanTarget::new("example")).await.unwrap();
    wait_for_state(&h.session, ScanState::Completed, Duration::from_secs(5)).await;

    let persisted: Vec<Uuid> = h.store.persisted.lock().clone();
    assert_eq!(persisted.len(), 4);
    assert_eq!(h.session.tracked_ephemeral_records(), 4);

    h.session.reset().await.unwrap();

    let batches = h.store.deleted_batches.lock().clone();
    assert_eq!(batches.len(), 1, "exactly one batch delete call");
    assert_eq!(batches[0].len(), 4);
    let batch_set: HashSet<Uuid> = batches[0].iter().copied().collect();
    assert_eq!(batch_set, persisted.iter().copied().collect::<HashSet<_>>());

    assert_eq!(h.session.tracked_ephemeral_records(), 0);
    assert_eq!(h.session.state(), ScanState::NotStarted);
    assert_eq!(h.session.alert_count(), 0);
    assert_eq!(h.session.total_requests(), 0);
    assert_eq!(h.session.progress(), 0);
    assert!(h.session.time_started().is_none());
}

#[tokio::test]
async fn reset_without_delete_policy_keeps_records() {
    let policy = ScanPolicy {
        delete_records_on_reset: false,
        ..test_policy()
    };
    let h = harness(policy, &["alpha.example.com"]);
    h.add_plugin(
        1,
        "probe",
        &[],
        Behavior::Probe {
            requests: 2,
            alerts: 0,
        },
    );

    h.session.start(ScanTarget::new("example")).await.unwrap();
    wait_for_state(&h.session, ScanState::Completed, Duration::from_secs(5)).await;

    h.session.reset().await.unwrap();
    assert!(h.store.deleted_batches.lock().is_empty());
    assert_eq!(h.session.state(), ScanState::NotStarted);
}

#[tokio::test]
async fn failed_cleanup_is_surfaced_but_session_still_resets() {
    let h = harness(test_policy(), &["alpha.example.com"]);
    h.add_plugin(
        1,
        "probe",
        &[],
        Behavior::Probe {
            requests: 3,
            alerts: 0,
        },
    );

    h.session.start(ScanTarget::new("example")).await.unwrap();
    wait_for_state(&h.session, ScanState::Completed, Duration::from_secs(5)).await;

    h.store.fail_delete.store(true, Ordering::SeqCst);
    let err = h.session.reset().await.unwrap_err();
    assert!(matches!(err, EngineError::Cleanup { failed: 3, .. }));
    assert_eq!(h.session.state(), ScanState::NotStarted);
}

#[tokio::test]
async fn reset_is_rejected_while_running() {
    let h = harness(test_policy(), &["alpha.example.com"]);
    h.add_plugin(1, "slow", &[], Behavior::Slow(Duration::from_millis(200)));

    h.session.start(ScanTarget::new("example")).await.unwrap();
    let err = h.session.reset().await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidTransition { op: "reset", .. }
    ));

    h.session.stop().unwrap();
    wait_for_state(&h.session, ScanState::Stopped, Duration::from_secs(5)).await;
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn alert_events_serialize_to_camel_case_json() {
    let h = harness(test_policy(), &["alpha.example.com"]);
    h.add_plugin(
        1,
        "probe",
        &[],
        Behavior::Probe {
            requests: 0,
            alerts: 1,
        },
    );

    let mut events = h.session.subscribe();
    h.session.start(ScanTarget::new("example")).await.unwrap();
    wait_for_state(&h.session, ScanState::Completed, Duration::from_secs(5)).await;

    let alert_event = drain_events(&mut events)
        .into_iter()
        .find(|event| matches!(event, ScanEvent::AlertRaised { .. }))
        .expect("an alert event must be published");

    let json = serde_json::to_value(&alert_event).unwrap();
    assert_eq!(json["type"], "alertRaised");
    assert_eq!(json["alert"]["pluginId"], 1);
    assert_eq!(json["alert"]["risk"], "MEDIUM");
}

#[tokio::test]
async fn listeners_receive_alerts_and_state_changes() {
    let h = harness(test_policy(), &["alpha.example.com"]);
    h.add_plugin(
        1,
        "probe",
        &[],
        Behavior::Probe {
            requests: 1,
            alerts: 2,
        },
    );

    let mut events = h.session.subscribe();
    h.session.start(ScanTarget::new("example")).await.unwrap();
    wait_for_state(&h.session, ScanState::Completed, Duration::from_secs(5)).await;

    let events = drain_events(&mut events);
    let mut saw_running = false;
    let mut saw_completed = false;
    let mut alert_events = 0;
    let mut host_completed = 0;
    for event in &events {
        match event {
            ScanEvent::StateChanged { state } => match state {
                ScanState::Running => saw_running = true,
                ScanState::Completed => saw_completed = true,
                _ => {}
            },
            ScanEvent::AlertRaised { alert } => {
                alert_events += 1;
                assert_eq!(alert.plugin_id, 1);
            }
            ScanEvent::HostCompleted { host } => {
                assert_eq!(host, "alpha.example.com");
                host_completed += 1;
            }
            _ => {}
        }
    }
    assert!(saw_running && saw_completed);
    assert_eq!(alert_events, 2);
    assert_eq!(host_completed, 1, "host completion fires exactly once");
}
