// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Telemetry Sink
//!
//! The [`Telemetry`] trait is the gateway core's one outlet for
//! observability: every terminal decision, every policy reload, every reload
//! failure goes through it. The default implementation emits structured
//! `tracing` events and mirrors each decision as an OpenTelemetry span (a
//! no-op unless an OTLP exporter has been installed at startup).
//!
//! Request params never reach this module in plaintext — the decision record
//! carries only their hash.

use opentelemetry::trace::{Span, Tracer};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use tracing::{error, info, warn};

use crate::domain::decision::DecisionRecord;
use crate::domain::policy::PolicySet;
use crate::infrastructure::policy_loader::LoadWarning;

/// Sink for gateway observability events.
pub trait Telemetry: Send + Sync {
    /// A request reached a terminal outcome.
    fn record_decision(&self, record: &DecisionRecord);

    /// A reload published a new snapshot.
    fn policy_reloaded(&self, snapshot: &PolicySet, warnings: &[LoadWarning]);

    /// A reload failed; the previous snapshot remains in force.
    fn policy_reload_failed(&self, error: &str);
}

/// Default sink: structured log events plus per-decision spans.
pub struct TracingTelemetry {
    service_name: &'static str,
}

impl TracingTelemetry {
    pub fn new() -> Self {
        Self {
            service_name: "aegis-gateway",
        }
    }
}

impl Default for TracingTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry for TracingTelemetry {
    fn record_decision(&self, record: &DecisionRecord) {
        let mut span = opentelemetry::global::tracer(self.service_name).start("policy.decision");
        span.set_attribute(KeyValue::new("agent.id", record.agent_id.clone()));
        span.set_attribute(KeyValue::new("tool.name", record.tool.clone()));
        span.set_attribute(KeyValue::new("tool.action", record.action.clone()));
        span.set_attribute(KeyValue::new("decision", record.decision.as_str()));
        span.set_attribute(KeyValue::new("params.hash", record.params_hash.clone()));
        span.set_attribute(KeyValue::new("latency.ms", record.latency_ms));
        span.set_attribute(KeyValue::new("trace.id", record.trace_id.clone()));
        span.set_attribute(KeyValue::new(
            "policy.fingerprint",
            record.policy_fingerprint.clone(),
        ));
        if let Some(parent) = &record.parent_agent {
            span.set_attribute(KeyValue::new("parent.agent", parent.clone()));
        }
        span.end();

        info!(
            target: "aegis::audit",
            trace_id = %record.trace_id,
            agent_id = %record.agent_id,
            parent_agent = record.parent_agent.as_deref().unwrap_or(""),
            tool = %record.tool,
            action = %record.action,
            decision = record.decision.as_str(),
            reason = record.reason.as_deref().unwrap_or(""),
            params_hash = %record.params_hash,
            latency_ms = record.latency_ms,
            policy_fingerprint = %record.policy_fingerprint,
            "Decision"
        );
    }

    fn policy_reloaded(&self, snapshot: &PolicySet, warnings: &[LoadWarning]) {
        for warning in warnings {
            warn!(
                path = %warning.path,
                message = %warning.message,
                "Policy load warning"
            );
        }
        info!(
            files = snapshot.sources().len(),
            agents = snapshot.agent_count(),
            fingerprint = %snapshot.fingerprint(),
            "Policies reloaded"
        );
    }

    fn policy_reload_failed(&self, error: &str) {
        error!(error = %error, "Policy reload failed; keeping previous snapshot");
    }
}

/// Install an OTLP span exporter behind the global tracer.
///
/// Called once at startup, only when an endpoint is configured; without it
/// the global tracer stays a no-op and decision spans cost nothing. The
/// returned provider must be kept and shut down on exit to flush the batch
/// queue.
///
/// # Errors
///
/// Returns an error if the exporter cannot be built for the endpoint.
pub async fn init_otlp_tracer(
    service_name: &str,
    endpoint: &str,
) -> Result<TracerProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;

    let resource = Resource::new(vec![KeyValue::new("service.name", service_name.to_string())]);

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    opentelemetry::global::set_tracer_provider(provider.clone());

    info!(endpoint = %endpoint, "OTLP trace exporter initialized");

    Ok(provider)
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing: {0}")]
    TracingInit(String),
}
