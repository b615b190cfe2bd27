//! Topic description to rendered video.
//!
//! `generate` turns a description into a scene script (single-pass or
//! multi-pass), `orchestrator` renders it and drives the bounded fix loop,
//! `artifacts` owns the output directory.

pub mod artifacts;
pub mod generate;
pub mod orchestrator;
pub mod plan;
pub mod render;

#[cfg(test)]
pub(crate) mod fakes;

pub use artifacts::ArtifactDir;
pub use orchestrator::{Attempt, AttemptOutcome, Orchestrator, RunOutcome, RunReport, RunSettings};
pub use render::{FailureReport, ManimRenderer, RenderOutcome, Renderer};

use crate::error::PipelineError;
use crate::llm::{GenerationRequest, GenerationService};
use crate::metrics::VideoMetrics;
use serde::Serialize;
use std::fmt;
use std::time::Instant;

/// How the scene script is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Plan, whole-scene code, checker rounds
    SinglePass,
    /// Plan, per-act code with a checker loop each, collation
    MultiPass,
}

impl PipelineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineMode::SinglePass => "single_pass",
            PipelineMode::MultiPass => "multi_pass",
        }
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation service that records every call in the run's metrics.
pub struct TrackedService<'a, S> {
    service: &'a S,
    metrics: &'a mut VideoMetrics,
}

impl<'a, S: GenerationService> TrackedService<'a, S> {
    pub fn new(service: &'a S, metrics: &'a mut VideoMetrics) -> Self {
        Self { service, metrics }
    }

    /// Run one request and return the completion text.
    pub async fn complete(&mut self, request: GenerationRequest) -> anyhow::Result<String> {
        let started = Instant::now();
        let response = self
            .service
            .generate(request.clone())
            .await
            .map_err(|e| PipelineError::generation(&request.purpose, format!("{:#}", e)))?;
        let elapsed = started.elapsed();

        self.metrics.record_llm_call(&request, &response, elapsed);
        tracing::debug!(
            purpose = %request.purpose,
            duration_ms = elapsed.as_millis() as u64,
            tokens = self.metrics.llm_calls.last().map(|c| c.total_tokens).unwrap_or(0),
            "llm call complete"
        );
        Ok(response.content)
    }

    pub fn metrics(&self) -> &VideoMetrics {
        self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut VideoMetrics {
        self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::ScriptedService;
    use super::*;

    #[tokio::test]
    async fn tracked_service_records_calls() {
        let service = ScriptedService::new(["hello world"]);
        let mut metrics = VideoMetrics::new("t", "d", PipelineMode::SinglePass, "m");
        let mut llm = TrackedService::new(&service, &mut metrics);

        let text = llm
            .complete(GenerationRequest::new("sys", "user", "plan", 4000))
            .await
            .unwrap();
        assert_eq!(text, "hello world");
        assert_eq!(llm.metrics().total_llm_calls, 1);
        assert_eq!(llm.metrics().llm_calls[0].purpose, "plan");
    }

    #[tokio::test]
    async fn tracked_service_wraps_failures() {
        let service = ScriptedService::new(Vec::<String>::new());
        let mut metrics = VideoMetrics::new("t", "d", PipelineMode::SinglePass, "m");
        let mut llm = TrackedService::new(&service, &mut metrics);

        let err = llm
            .complete(GenerationRequest::new("sys", "user", "check", 4000))
            .await
            .unwrap_err();
        let typed = err.downcast_ref::<PipelineError>().unwrap();
        assert!(matches!(typed, PipelineError::Generation { purpose, .. } if purpose == "check"));
        assert_eq!(metrics.total_llm_calls, 0);
    }

    #[test]
    fn mode_tags() {
        assert_eq!(PipelineMode::MultiPass.to_string(), "multi_pass");
        assert_eq!(
            serde_json::to_string(&PipelineMode::SinglePass).unwrap(),
            "\"single_pass\""
        );
    }
}
