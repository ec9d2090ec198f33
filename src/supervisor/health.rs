//! Health registry: push-based subsystem health state.
//!
//! Each subsystem holds a [`HealthReporter`] and writes its state whenever it
//! changes: the classifier once after its model loads, the chatbot on every
//! lifecycle transition. [`HealthRegistry::snapshot`] returns the cached
//! states, so `GET /health/` never waits on model I/O.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

// ── SubsystemHealth ───────────────────────────────────────────────────────────

/// Health state snapshot for a single subsystem.
#[derive(Debug, Clone, Serialize)]
pub struct SubsystemHealth {
    /// Subsystem identifier (`"classifier"`, `"chatbot"`).
    pub id: String,
    /// `true` = healthy; `false` = unhealthy or degraded.
    pub healthy: bool,
    /// Human-readable status message.
    pub message: String,
    /// Optional structured extra fields (model name, backend, …).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl SubsystemHealth {
    pub fn ok(id: impl Into<String>) -> Self {
        Self { id: id.into(), healthy: true, message: "ok".into(), details: None }
    }

    pub fn degraded(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self { id: id.into(), healthy: false, message: message.into(), details: None }
    }
}

// ── HealthRegistry ────────────────────────────────────────────────────────────

/// Shared registry of per-subsystem health states.
///
/// Clone freely: it is backed by an `Arc` and is `Send + Sync`.
#[derive(Clone, Default)]
pub struct HealthRegistry {
    inner: Arc<RwLock<HashMap<String, SubsystemHealth>>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reporter handle writing under `id`.
    pub fn reporter(&self, id: impl Into<String>) -> HealthReporter {
        HealthReporter { id: id.into(), registry: self.clone() }
    }

    /// Snapshot all current health states, sorted by id.
    pub async fn snapshot(&self) -> Vec<SubsystemHealth> {
        let map = self.inner.read().await;
        let mut v: Vec<_> = map.values().cloned().collect();
        v.sort_by(|a, b| a.id.cmp(&b.id));
        v
    }

    /// `true` if every registered subsystem is healthy, or none are registered.
    pub async fn all_healthy(&self) -> bool {
        self.inner.read().await.values().all(|h| h.healthy)
    }
}

// ── HealthReporter ────────────────────────────────────────────────────────────

/// Per-subsystem write handle into the [`HealthRegistry`].
#[derive(Clone)]
pub struct HealthReporter {
    id: String,
    registry: HealthRegistry,
}

impl HealthReporter {
    /// Mark the subsystem as healthy with a default "ok" message.
    pub async fn set_healthy(&self) {
        self.write(SubsystemHealth::ok(&self.id)).await;
    }

    /// Mark the subsystem as healthy with a custom message and optional details.
    pub async fn set_healthy_with(
        &self,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) {
        let mut h = SubsystemHealth::ok(&self.id);
        h.message = message.into();
        h.details = details;
        self.write(h).await;
    }

    /// Mark the subsystem as unhealthy with a reason message.
    pub async fn set_unhealthy(&self, message: impl Into<String>) {
        self.write(SubsystemHealth::degraded(&self.id, message)).await;
    }

    /// Current state for this subsystem, or `None` before the first write.
    pub async fn get_current(&self) -> Option<SubsystemHealth> {
        self.registry.inner.read().await.get(&self.id).cloned()
    }

    async fn write(&self, h: SubsystemHealth) {
        self.registry.inner.write().await.insert(self.id.clone(), h);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
