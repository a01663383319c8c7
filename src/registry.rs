// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Plugin Registry
 * Central catalog of registered plugins with their static metadata and
 * per-scan configuration
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::ScanPolicy;
use crate::errors::{EngineError, EngineResult};
use crate::plugin::{Plugin, PluginConfig, PluginDescriptor};
use crate::types::{AlertThreshold, AttackStrength, PluginCategory, ScanTarget};

/// Plugin catalog and per-plugin configuration store.
///
/// Registration is explicit: plugins are compiled in and registered by
/// the embedding application, never discovered at runtime.
pub struct PluginRegistry {
    plugins: RwLock<HashMap<u32, Arc<dyn Plugin>>>,
    by_name: RwLock<HashMap<String, u32>>,
    configs: RwLock<HashMap<u32, PluginConfig>>,
    policy: RwLock<ScanPolicy>,
}

impl PluginRegistry {
    pub fn new(policy: ScanPolicy) -> Self {
        Self {
            plugins: RwLock::new(HashMap::new()),
            by_name: RwLock::new(HashMap::new()),
            configs: RwLock::new(HashMap::new()),
            policy: RwLock::new(policy),
        }
    }

    /// Register a plugin. Both the numeric id and the code name must be
    /// unused.
    pub fn register(&self, plugin: Arc<dyn Plugin>) -> EngineResult<()> {
        let descriptor = plugin.descriptor().clone();

        let mut plugins = self.plugins.write();
        let mut by_name = self.by_name.write();

        if plugins.contains_key(&descriptor.id) {
            return Err(EngineError::DuplicateId(format!("id {}", descriptor.id)));
        }
        if by_name.contains_key(&descriptor.name) {
            return Err(EngineError::DuplicateId(descriptor.name.clone()));
        }

        by_name.insert(descriptor.name.clone(), descriptor.id);
        plugins.insert(descriptor.id, plugin);
        debug!(
            "[Registry] registered plugin {} ({})",
            descriptor.id, descriptor.name
        );
        Ok(())
    }

    pub fn policy(&self) -> ScanPolicy {
        self.policy.read().clone()
    }

    pub fn set_policy(&self, policy: ScanPolicy) {
        *self.policy.write() = policy;
    }

    /// Replace the operator configuration for one plugin.
    pub fn set_config(&self, id: u32, config: PluginConfig) {
        self.configs.write().insert(id, config);
    }

    /// Stored (unresolved) configuration for one plugin.
    pub fn config(&self, id: u32) -> PluginConfig {
        self.configs.read().get(&id).cloned().unwrap_or_default()
    }

    /// Effective configuration: `default` threshold/strength are
    /// substituted with the scan-wide policy values, and a missing delay
    /// falls back to the policy delay.
    pub fn resolve_config(&self, id: u32) -> PluginConfig {
        let stored = self.config(id);
        let policy = self.policy.read();

        PluginConfig {
            enabled: stored.enabled,
            threshold: match stored.threshold {
                AlertThreshold::Default => policy.concrete_threshold(),
                other => other,
            },
            strength: match stored.strength {
                AttackStrength::Default => policy.concrete_strength(),
                other => other,
            },
            delay_ms: stored.delay_ms.or(Some(policy.plugin_delay_ms)),
        }
    }

    pub fn get(&self, id: u32) -> Option<Arc<dyn Plugin>> {
        self.plugins.read().get(&id).cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        let id = *self.by_name.read().get(name)?;
        self.get(id)
    }

    pub fn descriptors(&self) -> Vec<PluginDescriptor> {
        let mut all: Vec<PluginDescriptor> = self
            .plugins
            .read()
            .values()
            .map(|p| p.descriptor().clone())
            .collect();
        all.sort_by_key(|d| d.id);
        all
    }

    pub fn by_category(&self, category: PluginCategory) -> Vec<PluginDescriptor> {
        self.descriptors()
            .into_iter()
            .filter(|d| d.category == category)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.plugins.read().len()
    }

    /// The plugins that will actually run against a target, paired with
    /// their resolved configuration snapshots and sorted by id.
    ///
    /// A plugin is excluded when it is disabled, its effective threshold
    /// is `off`, or its technology tags do not apply to the target.
    pub fn all_enabled_for(&self, target: &ScanTarget) -> Vec<(Arc<dyn Plugin>, PluginConfig)> {
        let mut enabled: Vec<(Arc<dyn Plugin>, PluginConfig)> = self
            .plugins
            .read()
            .values()
            .filter_map(|plugin| {
                let descriptor = plugin.descriptor();
                let config = self.resolve_config(descriptor.id);
                if !config.enabled || config.threshold.is_off() {
                    return None;
                }
                if !descriptor.applies_to(target) {
                    return None;
                }
                Some((Arc::clone(plugin), config))
            })
            .collect();
        enabled.sort_by_key(|(plugin, _)| plugin.descriptor().id);
        enabled
    }
}
