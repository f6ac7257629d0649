// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Tool Adapters
//!
//! The dispatch orchestrator forwards allowed requests to a [`ToolAdapter`].
//! Adapters are registered by tool name in an [`AdapterRegistry`]; the two
//! built-ins (`payments`, `files`) are in-memory mocks with realistic
//! validation so the gateway can be exercised end to end.
//!
//! Adapter error messages are part of the HTTP surface (502 bodies) and must
//! stay sanitized: they name the problem, never the payload.

pub mod files;
pub mod payments;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub use files::FilesAdapter;
pub use payments::PaymentsAdapter;

/// A tool the gateway can forward approved or allowed requests to.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    async fn invoke(&self, action: &str, params: &Value) -> Result<Value, AdapterError>;
}

/// Sanitized adapter failure, surfaced as HTTP 502.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("{0}")]
    InvalidParams(String),

    #[error("{0}")]
    NotFound(String),
}

/// Tool-name → adapter lookup.
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ToolAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in mock adapters.
    pub fn with_mock_adapters() -> Self {
        Self::new()
            .register("payments", Arc::new(PaymentsAdapter::new()))
            .register("files", Arc::new(FilesAdapter::new()))
    }

    pub fn register(mut self, tool: &str, adapter: Arc<dyn ToolAdapter>) -> Self {
        self.adapters.insert(tool.to_string(), adapter);
        self
    }

    pub async fn invoke(
        &self,
        tool: &str,
        action: &str,
        params: &Value,
    ) -> Result<Value, AdapterError> {
        let adapter = self
            .adapters
            .get(tool)
            .ok_or_else(|| AdapterError::UnknownTool(tool.to_string()))?;
        adapter.invoke(action, params).await
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_mock_adapters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_unknown_tool_rejected() {
        let registry = AdapterRegistry::with_mock_adapters();
        let err = registry
            .invoke("teleport", "engage", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn test_known_tools_routed() {
        let registry = AdapterRegistry::with_mock_adapters();
        let result = registry
            .invoke(
                "payments",
                "create",
                &json!({"amount": 10.0, "currency": "USD", "vendor_id": "V1"}),
            )
            .await
            .unwrap();
        assert_eq!(result["status"], "created");
    }
}
