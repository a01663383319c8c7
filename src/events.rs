// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scan Event Bus
 * Streams session state changes, findings and per-plugin completion
 * updates to any number of listeners over unbounded channels
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::{Alert, PluginState, ScanState};

/// One event emitted by a running scan session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScanEvent {
    #[serde(rename_all = "camelCase")]
    StateChanged { state: ScanState },

    #[serde(rename_all = "camelCase")]
    AlertRaised { alert: Alert },

    #[serde(rename_all = "camelCase")]
    PluginCompleted {
        host: String,
        plugin_id: u32,
        plugin_name: String,
        state: PluginState,
        duration_ms: u64,
    },

    #[serde(rename_all = "camelCase")]
    HostProgress { host: String, percent: u8 },

    #[serde(rename_all = "camelCase")]
    HostCompleted { host: String },
}

/// Fan-out of scan events to subscribers.
///
/// Any consumer (GUI, CLI, API) drains its receiver on its own task;
/// closed receivers are pruned on the next publish.
#[derive(Default)]
pub struct EventBus {
    subscribers: parking_lot::Mutex<Vec<mpsc::UnboundedSender<ScanEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ScanEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: ScanEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
