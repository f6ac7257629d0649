// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mock payments tool: `create` and `refund` over an in-memory ledger.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{AdapterError, ToolAdapter};

#[derive(Debug, Deserialize)]
struct CreateRequest {
    amount: f64,
    currency: String,
    vendor_id: String,
    #[serde(default)]
    #[allow(dead_code)]
    memo: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct CreateResponse {
    payment_id: String,
    amount: f64,
    currency: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct RefundRequest {
    payment_id: String,
    #[serde(default)]
    #[allow(dead_code)]
    reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct RefundResponse {
    refund_id: String,
    payment_id: String,
    status: String,
}

pub struct PaymentsAdapter {
    payments: Mutex<HashMap<String, CreateResponse>>,
}

impl PaymentsAdapter {
    pub fn new() -> Self {
        Self {
            payments: Mutex::new(HashMap::new()),
        }
    }

    fn create(&self, req: CreateRequest) -> Result<Value, AdapterError> {
        if req.amount <= 0.0 {
            return Err(AdapterError::InvalidParams(
                "amount must be positive".to_string(),
            ));
        }
        if req.currency.is_empty() {
            return Err(AdapterError::InvalidParams(
                "currency is required".to_string(),
            ));
        }
        if req.vendor_id.is_empty() {
            return Err(AdapterError::InvalidParams(
                "vendor_id is required".to_string(),
            ));
        }

        let payment = CreateResponse {
            payment_id: Uuid::new_v4().simple().to_string(),
            amount: req.amount,
            currency: req.currency,
            status: "created".to_string(),
        };
        let value = serde_json::to_value(&payment)
            .map_err(|_| AdapterError::InvalidParams("invalid payment record".to_string()))?;
        self.payments
            .lock()
            .insert(payment.payment_id.clone(), payment);
        Ok(value)
    }

    fn refund(&self, req: RefundRequest) -> Result<Value, AdapterError> {
        if req.payment_id.is_empty() {
            return Err(AdapterError::InvalidParams(
                "payment_id is required".to_string(),
            ));
        }
        if !self.payments.lock().contains_key(&req.payment_id) {
            return Err(AdapterError::NotFound(format!(
                "payment '{}' not found",
                req.payment_id
            )));
        }

        let refund = RefundResponse {
            refund_id: Uuid::new_v4().simple().to_string(),
            payment_id: req.payment_id,
            status: "refunded".to_string(),
        };
        serde_json::to_value(&refund)
            .map_err(|_| AdapterError::InvalidParams("invalid refund record".to_string()))
    }
}

impl Default for PaymentsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolAdapter for PaymentsAdapter {
    async fn invoke(&self, action: &str, params: &Value) -> Result<Value, AdapterError> {
        match action {
            "create" => {
                let req: CreateRequest = serde_json::from_value(params.clone()).map_err(|_| {
                    AdapterError::InvalidParams(
                        "invalid parameters for payments.create".to_string(),
                    )
                })?;
                self.create(req)
            }
            "refund" => {
                let req: RefundRequest = serde_json::from_value(params.clone()).map_err(|_| {
                    AdapterError::InvalidParams(
                        "invalid parameters for payments.refund".to_string(),
                    )
                })?;
                self.refund(req)
            }
            other => Err(AdapterError::UnknownAction(other.to_string())),
        }
    }
}
