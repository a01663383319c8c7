// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scan Metrics
 * Engine counters with tracing integration
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::types::PluginState;

/// Counters for one scan session's lifetime
#[derive(Debug, Default)]
pub struct ScanMetrics {
    requests_sent: AtomicU64,
    alerts_raised: AtomicU64,
    plugins_completed: AtomicU64,
    plugins_failed: AtomicU64,
    records_persisted: AtomicU64,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert(&self) {
        self.alerts_raised.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_plugin_settled(&self, state: PluginState) {
        match state {
            PluginState::Done => {
                self.plugins_completed.fetch_add(1, Ordering::Relaxed);
            }
            PluginState::Error => {
                self.plugins_failed.fetch_add(1, Ordering::Relaxed);
                debug!("plugin recorded as failed");
            }
            _ => {}
        }
    }

    pub fn record_persisted(&self) {
        self.records_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_sent(&self) -> u64 {
        self.requests_sent.load(Ordering::Relaxed)
    }

    pub fn alerts_raised(&self) -> u64 {
        self.alerts_raised.load(Ordering::Relaxed)
    }

    pub fn plugins_completed(&self) -> u64 {
        self.plugins_completed.load(Ordering::Relaxed)
    }

    pub fn plugins_failed(&self) -> u64 {
        self.plugins_failed.load(Ordering::Relaxed)
    }

    pub fn records_persisted(&self) -> u64 {
        self.records_persisted.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.requests_sent.store(0, Ordering::Relaxed);
        self.alerts_raised.store(0, Ordering::Relaxed);
        self.plugins_completed.store(0, Ordering::Relaxed);
        self.plugins_failed.store(0, Ordering::Relaxed);
        self.records_persisted.store(0, Ordering::Relaxed);
    }
}
