// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - External Interfaces
 * Narrow traits for the collaborators the engine consumes: the site
 * provider, the HTTP transport and the transaction store
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;
use uuid::Uuid;

use crate::errors::EngineResult;
use crate::types::ScanTarget;

/// One request a plugin asks the transport to send
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub method: String,
    pub url: Url,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl ScanRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn post(url: Url, body: impl Into<String>) -> Self {
        Self {
            method: "POST".to_string(),
            url,
            headers: HashMap::new(),
            body: Some(body.into()),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// The transport's answer to a request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: String,
    pub elapsed_ms: u64,
}

/// One request/response pair as the engine books it.
///
/// `id` is `None` until the record has been durably persisted; the
/// session assigns an ephemeral id through the transaction store and
/// tracks it for batch cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: Option<Uuid>,
    pub plugin_id: u32,
    pub host: String,
    pub request: ScanRequest,
    pub response: Option<ScanResponse>,
}

/// Supplies the set of in-scope hosts for a scan target.
///
/// The engine treats the provider as an opaque resolver; discovery
/// (spider, brute-forcer) lives behind it.
#[async_trait]
pub trait SiteProvider: Send + Sync {
    async fn hosts_in_scope(&self, target: &ScanTarget) -> EngineResult<Vec<String>>;
}

/// Sends HTTP requests on behalf of plugins.
///
/// Timeouts are the transport's responsibility; the engine only applies
/// per-plugin pacing around calls to it.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &ScanRequest) -> EngineResult<ScanResponse>;
}

/// Persists scan bookkeeping records and deletes them in batches.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn persist_ephemeral(&self, record: &TransactionRecord) -> EngineResult<Uuid>;

    async fn delete_batch(&self, ids: &[Uuid]) -> EngineResult<()>;
}
