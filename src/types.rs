// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Risk level a plugin attaches to a finding
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Risk {
    Info,
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Risk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Risk::Info => write!(f, "INFO"),
            Risk::Low => write!(f, "LOW"),
            Risk::Medium => write!(f, "MEDIUM"),
            Risk::High => write!(f, "HIGH"),
        }
    }
}

/// How certain a plugin is about a finding
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::Low => write!(f, "LOW"),
            Confidence::Medium => write!(f, "MEDIUM"),
            Confidence::High => write!(f, "HIGH"),
        }
    }
}

/// Certainty level required before a plugin reports a finding.
///
/// `Off` disables the plugin entirely; `Default` defers to the scan-wide
/// policy setting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AlertThreshold {
    Off,
    Default,
    Low,
    Medium,
    High,
}

impl AlertThreshold {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertThreshold::Off => "off",
            AlertThreshold::Default => "default",
            AlertThreshold::Low => "low",
            AlertThreshold::Medium => "medium",
            AlertThreshold::High => "high",
        }
    }

    pub fn is_off(&self) -> bool {
        matches!(self, AlertThreshold::Off)
    }
}

impl std::fmt::Display for AlertThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Relative request volume a plugin is permitted to use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AttackStrength {
    Default,
    Low,
    Medium,
    High,
    Insane,
}

impl AttackStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackStrength::Default => "default",
            AttackStrength::Low => "low",
            AttackStrength::Medium => "medium",
            AttackStrength::High => "high",
            AttackStrength::Insane => "insane",
        }
    }

    /// Rough request-volume multiplier used for progress weighting.
    pub fn request_multiplier(&self) -> u32 {
        match self {
            AttackStrength::Low => 1,
            AttackStrength::Default | AttackStrength::Medium => 2,
            AttackStrength::High => 4,
            AttackStrength::Insane => 8,
        }
    }
}

impl std::fmt::Display for AttackStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Plugin category enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PluginCategory {
    Injection,
    InformationDisclosure,
    Authentication,
    Configuration,
    ClientSide,
    ServerSide,
    Network,
}

/// Lifecycle of a single plugin within one host scan
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginState {
    Pending,
    Running,
    Done,
    Error,
}

impl PluginState {
    /// A settled plugin no longer blocks anything that depends on it.
    pub fn is_settled(&self) -> bool {
        matches!(self, PluginState::Done | PluginState::Error)
    }
}

impl std::fmt::Display for PluginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginState::Pending => write!(f, "PENDING"),
            PluginState::Running => write!(f, "RUNNING"),
            PluginState::Done => write!(f, "DONE"),
            PluginState::Error => write!(f, "ERROR"),
        }
    }
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanState {
    NotStarted,
    Running,
    Paused,
    Stopping,
    Stopped,
    Completed,
}

impl ScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::NotStarted => "NOT_STARTED",
            ScanState::Running => "RUNNING",
            ScanState::Paused => "PAUSED",
            ScanState::Stopping => "STOPPING",
            ScanState::Stopped => "STOPPED",
            ScanState::Completed => "COMPLETED",
        }
    }

    /// States from which a new scan may be started.
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            ScanState::NotStarted | ScanState::Completed | ScanState::Stopped
        )
    }

    /// A scan is active while host processes may still be doing work.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ScanState::Running | ScanState::Paused | ScanState::Stopping
        )
    }
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reported finding, immutable once emitted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: Uuid,
    pub plugin_id: u32,
    pub name: String,
    pub risk: Risk,
    pub confidence: Confidence,
    pub uri: String,
    pub parameter: Option<String>,
    pub evidence: Option<String>,
    pub cwe_id: Option<u32>,
    pub wasc_id: Option<u32>,
    /// Transaction record the finding was observed on, when one exists.
    pub transaction_id: Option<Uuid>,
    pub raised_at: String,
}

impl Alert {
    pub fn new(
        plugin_id: u32,
        name: impl Into<String>,
        risk: Risk,
        confidence: Confidence,
        uri: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            plugin_id,
            name: name.into(),
            risk,
            confidence,
            uri: uri.into(),
            parameter: None,
            evidence: None,
            cwe_id: None,
            wasc_id: None,
            transaction_id: None,
            raised_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }

    pub fn with_cwe(mut self, cwe_id: u32) -> Self {
        self.cwe_id = Some(cwe_id);
        self
    }

    pub fn with_wasc(mut self, wasc_id: u32) -> Self {
        self.wasc_id = Some(wasc_id);
        self
    }

    pub fn with_transaction(mut self, transaction_id: Uuid) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }
}

/// What to scan: a named site plus the technology tags used to skip
/// plugins that cannot apply to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanTarget {
    pub name: String,
    #[serde(default)]
    pub tech_include: HashSet<String>,
    #[serde(default)]
    pub tech_exclude: HashSet<String>,
}

impl ScanTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tech_include: HashSet::new(),
            tech_exclude: HashSet::new(),
        }
    }

    pub fn with_tech(mut self, tag: impl Into<String>) -> Self {
        self.tech_include.insert(tag.into());
        self
    }

    pub fn without_tech(mut self, tag: impl Into<String>) -> Self {
        self.tech_exclude.insert(tag.into());
        self
    }
}
