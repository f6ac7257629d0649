// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mock files tool: `read` and `write` over a seeded in-memory corpus.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{AdapterError, ToolAdapter};

#[derive(Debug, Deserialize)]
struct ReadRequest {
    path: String,
}

#[derive(Debug, Deserialize)]
struct WriteRequest {
    path: String,
    content: String,
}

pub struct FilesAdapter {
    files: Mutex<HashMap<String, String>>,
}

impl FilesAdapter {
    pub fn new() -> Self {
        let mut files = HashMap::new();
        files.insert(
            "/hr-docs/employee-handbook.txt".to_string(),
            "Employee Handbook Version 2.0\n\nWelcome to the company...".to_string(),
        );
        files.insert(
            "/hr-docs/benefits.txt".to_string(),
            "Benefits Information\n\nHealth Insurance: ...".to_string(),
        );
        files.insert(
            "/legal/contract.docx".to_string(),
            "CONFIDENTIAL LEGAL CONTRACT\n\nThis agreement...".to_string(),
        );
        Self {
            files: Mutex::new(files),
        }
    }

    fn read(&self, req: ReadRequest) -> Result<Value, AdapterError> {
        if req.path.is_empty() {
            return Err(AdapterError::InvalidParams("path is required".to_string()));
        }
        let files = self.files.lock();
        let content = files
            .get(&req.path)
            .ok_or_else(|| AdapterError::NotFound(format!("file '{}' not found", req.path)))?;
        Ok(json!({ "path": req.path, "content": content }))
    }

    fn write(&self, req: WriteRequest) -> Result<Value, AdapterError> {
        if req.path.is_empty() {
            return Err(AdapterError::InvalidParams("path is required".to_string()));
        }
        self.files.lock().insert(req.path.clone(), req.content);
        Ok(json!({ "path": req.path, "status": "written" }))
    }
}

impl Default for FilesAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolAdapter for FilesAdapter {
    async fn invoke(&self, action: &str, params: &Value) -> Result<Value, AdapterError> {
        match action {
            "read" => {
                let req: ReadRequest = serde_json::from_value(params.clone()).map_err(|_| {
                    AdapterError::InvalidParams("invalid parameters for files.read".to_string())
                })?;
                self.read(req)
            }
            "write" => {
                let req: WriteRequest = serde_json::from_value(params.clone()).map_err(|_| {
                    AdapterError::InvalidParams("invalid parameters for files.write".to_string())
                })?;
                self.write(req)
            }
            other => Err(AdapterError::UnknownAction(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_seeded_file() {
        let adapter = FilesAdapter::new();
        let result = adapter
            .invoke("read", &json!({"path": "/hr-docs/employee-handbook.txt"}))
            .await
            .unwrap();
        assert!(result["content"]
            .as_str()
            .unwrap()
            .starts_with("Employee Handbook"));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let adapter = FilesAdapter::new();
        let err = adapter
            .invoke("read", &json!({"path": "/nowhere.txt"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_write_then_read_back() {
        let adapter = FilesAdapter::new();
        let written = adapter
            .invoke(
                "write",
                &json!({"path": "/hr-docs/new.txt", "content": "fresh"}),
            )
            .await
            .unwrap();
        assert_eq!(written["status"], "written");

        let read = adapter
            .invoke("read", &json!({"path": "/hr-docs/new.txt"}))
            .await
            .unwrap();
        assert_eq!(read["content"], "fresh");
    }

    #[tokio::test]
    async fn test_read_requires_path_param() {
        let adapter = FilesAdapter::new();
        let err = adapter.invoke("read", &json!({})).await.unwrap_err();
        assert!(matches!(err, AdapterError::InvalidParams(_)));
    }
}
