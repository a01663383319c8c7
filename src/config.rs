// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scan Policy Configuration
 * Scan-wide defaults applied to every plugin that defers to them
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use anyhow::Result;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::{AlertThreshold, AttackStrength};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScanPolicy {
    /// Threshold substituted when a plugin's own setting is `default`
    #[serde(default = "default_threshold")]
    pub default_threshold: AlertThreshold,

    /// Strength substituted when a plugin's own setting is `default`
    #[serde(default = "default_strength")]
    pub default_strength: AttackStrength,

    /// Worker pool size per host process
    #[validate(range(min = 1, max = 10))]
    #[serde(default = "default_host_workers")]
    pub host_workers: usize,

    /// Delay between requests issued by one plugin, in milliseconds
    #[serde(default)]
    pub plugin_delay_ms: u64,

    /// Optional requests-per-second cap applied per running plugin
    #[serde(default)]
    pub plugin_rps: Option<u32>,

    /// Soft watchdog: a plugin exceeding this is marked ERROR and the
    /// host moves on. 0 disables the watchdog.
    #[validate(range(max = 86_400))]
    #[serde(default = "default_watchdog_secs")]
    pub plugin_watchdog_secs: u64,

    /// Delete ephemeral transaction records when the session is reset
    #[serde(default = "default_true")]
    pub delete_records_on_reset: bool,
}

fn default_threshold() -> AlertThreshold {
    AlertThreshold::Medium
}

fn default_strength() -> AttackStrength {
    AttackStrength::Medium
}

fn default_host_workers() -> usize {
    2
}

fn default_watchdog_secs() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            default_threshold: default_threshold(),
            default_strength: default_strength(),
            host_workers: default_host_workers(),
            plugin_delay_ms: 0,
            plugin_rps: None,
            plugin_watchdog_secs: default_watchdog_secs(),
            delete_records_on_reset: default_true(),
        }
    }
}

impl ScanPolicy {
    /// Load the policy from environment variables with sensible defaults
    ///
    /// Supports the following environment variables:
    /// - HOST_WORKERS: worker pool size per host
    /// - PLUGIN_DELAY_MS: inter-request delay per plugin
    /// - PLUGIN_RPS: per-plugin requests-per-second cap
    /// - PLUGIN_WATCHDOG_SECS: per-plugin watchdog (0 disables)
    /// - DELETE_RECORDS_ON_RESET: true/false
    pub fn from_env() -> Result<Self> {
        let mut policy = Self::default();

        if let Ok(workers) = std::env::var("HOST_WORKERS") {
            policy.host_workers = workers
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid HOST_WORKERS value"))?;
        }

        if let Ok(delay) = std::env::var("PLUGIN_DELAY_MS") {
            policy.plugin_delay_ms = delay
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid PLUGIN_DELAY_MS value"))?;
        }

        if let Ok(rps) = std::env::var("PLUGIN_RPS") {
            policy.plugin_rps = Some(
                rps.parse()
                    .map_err(|_| anyhow::anyhow!("Invalid PLUGIN_RPS value"))?,
            );
        }

        if let Ok(watchdog) = std::env::var("PLUGIN_WATCHDOG_SECS") {
            policy.plugin_watchdog_secs = watchdog
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid PLUGIN_WATCHDOG_SECS value"))?;
        }

        if let Ok(delete) = std::env::var("DELETE_RECORDS_ON_RESET") {
            policy.delete_records_on_reset = delete
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid DELETE_RECORDS_ON_RESET value"))?;
        }

        policy.validate()?;
        Ok(policy)
    }

    /// Effective threshold once `default` has been resolved away.
    pub fn concrete_threshold(&self) -> AlertThreshold {
        match self.default_threshold {
            AlertThreshold::Default => AlertThreshold::Medium,
            other => other,
        }
    }

    /// Effective strength once `default` has been resolved away.
    pub fn concrete_strength(&self) -> AttackStrength {
        match self.default_strength {
            AttackStrength::Default => AttackStrength::Medium,
            other => other,
        }
    }
}
