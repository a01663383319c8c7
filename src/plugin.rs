// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Plugin Contract
 * The capability trait every attack plugin implements, its static
 * descriptor, per-scan configuration and the per-run scan context
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};
use crate::host_process::ScanControls;
use crate::rate_limiter::RequestPacer;
use crate::transport::{HttpTransport, ScanRequest, ScanResponse, TransactionRecord};
use crate::types::{
    Alert, AlertThreshold, AttackStrength, PluginCategory, Risk, ScanTarget,
};

/// Static plugin metadata, immutable after registration.
///
/// `name` is the code name: unique, stable across runs, and the value
/// other plugins list in their `dependencies`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub id: u32,
    pub name: String,
    pub display_name: String,
    pub category: PluginCategory,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub max_risk: Risk,
    #[serde(default)]
    pub cwe_ids: Vec<u32>,
    #[serde(default)]
    pub wasc_ids: Vec<u32>,
    /// Technology tags the plugin applies to; empty means everywhere
    #[serde(default)]
    pub tech_tags: Vec<String>,
    #[serde(default = "all_thresholds")]
    pub supported_thresholds: Vec<AlertThreshold>,
    #[serde(default = "all_strengths")]
    pub supported_strengths: Vec<AttackStrength>,
    /// Relative request volume at medium strength, used for progress
    /// weighting
    #[serde(default = "default_request_cost")]
    pub base_request_cost: u32,
}

fn all_thresholds() -> Vec<AlertThreshold> {
    vec![
        AlertThreshold::Off,
        AlertThreshold::Default,
        AlertThreshold::Low,
        AlertThreshold::Medium,
        AlertThreshold::High,
    ]
}

fn all_strengths() -> Vec<AttackStrength> {
    vec![
        AttackStrength::Default,
        AttackStrength::Low,
        AttackStrength::Medium,
        AttackStrength::High,
        AttackStrength::Insane,
    ]
}

fn default_request_cost() -> u32 {
    1
}

impl PluginDescriptor {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        display_name: impl Into<String>,
        category: PluginCategory,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            display_name: display_name.into(),
            category,
            description: String::new(),
            dependencies: Vec::new(),
            max_risk: Risk::Medium,
            cwe_ids: Vec::new(),
            wasc_ids: Vec::new(),
            tech_tags: Vec::new(),
            supported_thresholds: all_thresholds(),
            supported_strengths: all_strengths(),
            base_request_cost: default_request_cost(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_max_risk(mut self, risk: Risk) -> Self {
        self.max_risk = risk;
        self
    }

    pub fn with_tech_tags(mut self, tags: Vec<String>) -> Self {
        self.tech_tags = tags;
        self
    }

    pub fn with_request_cost(mut self, cost: u32) -> Self {
        self.base_request_cost = cost;
        self
    }

    /// Whether this plugin applies to the target's technology set.
    pub fn applies_to(&self, target: &ScanTarget) -> bool {
        if self.tech_tags.is_empty() {
            return true;
        }
        if self
            .tech_tags
            .iter()
            .any(|tag| target.tech_exclude.contains(tag))
        {
            return false;
        }
        if target.tech_include.is_empty() {
            return true;
        }
        self.tech_tags
            .iter()
            .any(|tag| target.tech_include.contains(tag))
    }

    /// Progress weight for one run of this plugin at the given strength.
    pub fn weight(&self, strength: AttackStrength) -> u64 {
        self.base_request_cost.max(1) as u64 * strength.request_multiplier() as u64
    }
}

/// Per-scan plugin configuration, owned by the operator layer.
///
/// Host processes take a read-only resolved snapshot at scan start;
/// changes made mid-scan only affect future scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_threshold")]
    pub threshold: AlertThreshold,
    #[serde(default = "default_strength")]
    pub strength: AttackStrength,
    /// Delay between requests, in milliseconds; falls back to the
    /// scan-wide policy when unset
    #[serde(default)]
    pub delay_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn default_threshold() -> AlertThreshold {
    AlertThreshold::Default
}

fn default_strength() -> AttackStrength {
    AttackStrength::Default
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: AlertThreshold::Default,
            strength: AttackStrength::Default,
            delay_ms: None,
        }
    }
}

/// Sink through which running plugins report back into the session.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Record a finding. The session persists it, counts it and fans it
    /// out to listeners.
    async fn raise_alert(&self, alert: Alert);

    /// Record a request the plugin issued. Returns the ephemeral record
    /// id when the session had to persist one.
    async fn notify_message(&self, record: TransactionRecord) -> EngineResult<Option<Uuid>>;
}

/// A pluggable attack unit.
///
/// Implementations are stateless across runs; everything per-run comes
/// in through the [`ScanContext`]. Detection internals are entirely the
/// plugin's business; the engine only schedules, paces and books.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn descriptor(&self) -> &PluginDescriptor;

    async fn scan(&self, ctx: &ScanContext) -> anyhow::Result<()>;
}

impl std::fmt::Debug for dyn Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.descriptor().fmt(f)
    }
}

/// Per-run context handed to a plugin's `scan`.
///
/// Carries the target host, the resolved configuration snapshot and the
/// paced, cancel-aware path to the transport and the alert sink.
pub struct ScanContext {
    host: String,
    plugin_id: u32,
    config: PluginConfig,
    transport: Arc<dyn HttpTransport>,
    sink: Arc<dyn AlertSink>,
    controls: Arc<ScanControls>,
    pacer: RequestPacer,
}

impl ScanContext {
    pub(crate) fn new(
        host: String,
        plugin_id: u32,
        config: PluginConfig,
        rps: Option<u32>,
        transport: Arc<dyn HttpTransport>,
        sink: Arc<dyn AlertSink>,
        controls: Arc<ScanControls>,
    ) -> Self {
        let pacer = RequestPacer::new(config.delay_ms.unwrap_or(0), rps);
        Self {
            host,
            plugin_id,
            config,
            transport,
            sink,
            controls,
            pacer,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Resolved certainty threshold for this run.
    pub fn threshold(&self) -> AlertThreshold {
        self.config.threshold
    }

    /// Resolved attack strength for this run.
    pub fn strength(&self) -> AttackStrength {
        self.config.strength
    }

    /// Plugins are expected to check this between the requests they
    /// issue; cancellation is cooperative, never forced.
    pub fn is_cancelled(&self) -> bool {
        self.controls.is_cancelled()
    }

    /// Send one request through the external transport, paced by the
    /// per-plugin delay and booked with the session.
    pub async fn send_request(&self, request: ScanRequest) -> EngineResult<ScanResponse> {
        if self.controls.is_cancelled() {
            return Err(EngineError::Aborted);
        }

        self.pacer.pace().await;

        let response = self.transport.send(&request).await?;

        let record = TransactionRecord {
            id: None,
            plugin_id: self.plugin_id,
            host: self.host.clone(),
            request,
            response: Some(response.clone()),
        };
        self.sink.notify_message(record).await?;

        Ok(response)
    }

    /// Report a finding through the session's alert sink.
    pub async fn raise_alert(&self, alert: Alert) {
        self.sink.raise_alert(alert).await;
    }
}
