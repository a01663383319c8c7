// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Engine Error Types
 * Error taxonomy for the active scan scheduling engine
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use thiserror::Error;

use crate::types::ScanState;

/// Engine error taxonomy.
///
/// Configuration-time errors (`DuplicateId`, `DependencyCycle`) block the
/// affected plugin or scan from being scheduled at all. Runtime errors
/// (`PluginExecution`, `Transport`) are recovered locally and never abort
/// a host scan. `Cleanup` is surfaced to the caller of `reset()` but does
/// not keep the session from returning to NOT_STARTED.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A plugin with the same id or code name is already registered
    #[error("duplicate plugin id or name: {0}")]
    DuplicateId(String),

    /// The enabled plugin set has no valid execution order
    #[error("dependency cycle detected: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    /// start() called while the session is active
    #[error("scan already running (state: {state})")]
    AlreadyRunning { state: ScanState },

    /// A lifecycle operation that does not match the state graph
    #[error("invalid transition: {op}() while {from}")]
    InvalidTransition { from: ScanState, op: &'static str },

    /// A plugin failed against one host; the host scan continues
    #[error("plugin {plugin} failed against {host}: {reason}")]
    PluginExecution {
        plugin: String,
        host: String,
        reason: String,
    },

    /// Batch deletion of ephemeral records failed in part or in full
    #[error("ephemeral cleanup failed for {failed} of {total} records: {reason}")]
    Cleanup {
        failed: usize,
        total: usize,
        reason: String,
    },

    /// Surfaced by the external transport; treated as a plugin
    /// execution failure at the scheduling layer
    #[error("transport error: {0}")]
    Transport(String),

    /// The scan was cancelled while a plugin was issuing requests
    #[error("scan aborted")]
    Aborted,
}

impl EngineError {
    /// Whether the error must stop scheduling (configuration-time) or is
    /// recovered locally (runtime).
    pub fn is_fatal(&self) -> bool {
        match self {
            EngineError::DuplicateId(_)
            | EngineError::DependencyCycle { .. }
            | EngineError::AlreadyRunning { .. }
            | EngineError::InvalidTransition { .. } => true,
            EngineError::PluginExecution { .. }
            | EngineError::Cleanup { .. }
            | EngineError::Transport(_)
            | EngineError::Aborted => false,
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
