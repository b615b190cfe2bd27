//! Per-run metrics: LLM usage, render attempts and the error breakdown.
//!
//! Written as `metrics.json` plus a human-readable `metrics_summary.txt` at
//! the end of every run, successful or not.

use crate::diagnose::ErrorCategory;
use crate::llm::{GenerationRequest, LlmResponse};
use crate::pipeline::PipelineMode;
use anyhow::Context;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

pub const METRICS_FILE: &str = "metrics.json";
pub const SUMMARY_FILE: &str = "metrics_summary.txt";

const DESCRIPTION_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct LlmCall {
    pub timestamp: DateTime<Local>,
    pub purpose: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub duration_seconds: f64,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderAttemptRecord {
    pub attempt_number: usize,
    pub success: bool,
    pub error_type: Option<ErrorCategory>,
    pub error_message: Option<String>,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoMetrics {
    pub run_id: Uuid,
    /// Output directory name
    pub video_id: String,
    pub description: String,
    pub pipeline: PipelineMode,
    pub model: String,

    pub llm_calls: Vec<LlmCall>,
    pub total_llm_calls: usize,
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,

    pub start_time: DateTime<Local>,
    pub end_time: Option<DateTime<Local>>,
    pub total_duration_seconds: f64,
    pub generation_duration_seconds: f64,
    pub render_duration_seconds: f64,

    pub render_attempts: Vec<RenderAttemptRecord>,
    pub total_render_attempts: usize,
    pub first_pass_success: bool,
    pub final_success: bool,

    pub spatial_errors: usize,
    pub timing_errors: usize,
    /// API misuse and syntax failures together
    pub api_errors: usize,
}

fn word_count(text: &str) -> u32 {
    u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX)
}

impl VideoMetrics {
    pub fn new(
        video_id: impl Into<String>,
        description: &str,
        pipeline: PipelineMode,
        model: impl Into<String>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            video_id: video_id.into(),
            description: description.chars().take(DESCRIPTION_MAX_CHARS).collect(),
            pipeline,
            model: model.into(),
            llm_calls: Vec::new(),
            total_llm_calls: 0,
            total_tokens: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            start_time: Local::now(),
            end_time: None,
            total_duration_seconds: 0.0,
            generation_duration_seconds: 0.0,
            render_duration_seconds: 0.0,
            render_attempts: Vec::new(),
            total_render_attempts: 0,
            first_pass_success: false,
            final_success: false,
            spatial_errors: 0,
            timing_errors: 0,
            api_errors: 0,
        }
    }

    /// Record a completed call. Falls back to word counts when the service
    /// reports no usage.
    pub fn record_llm_call(
        &mut self,
        request: &GenerationRequest,
        response: &LlmResponse,
        duration: Duration,
    ) {
        let (prompt_tokens, completion_tokens) = match &response.usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
            None => (
                word_count(&request.system).saturating_add(word_count(&request.user)),
                word_count(&response.content),
            ),
        };
        let model = if response.model.is_empty() {
            self.model.clone()
        } else {
            response.model.clone()
        };

        self.llm_calls.push(LlmCall {
            timestamp: Local::now(),
            purpose: request.purpose.clone(),
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
            duration_seconds: duration.as_secs_f64(),
            model,
        });
        self.total_llm_calls += 1;
        self.prompt_tokens += u64::from(prompt_tokens);
        self.completion_tokens += u64::from(completion_tokens);
        self.total_tokens += u64::from(prompt_tokens) + u64::from(completion_tokens);
        self.generation_duration_seconds += duration.as_secs_f64();
    }

    pub fn record_render_attempt(
        &mut self,
        attempt_number: usize,
        success: bool,
        error_type: Option<ErrorCategory>,
        error_message: Option<&str>,
        duration: Duration,
    ) {
        self.render_attempts.push(RenderAttemptRecord {
            attempt_number,
            success,
            error_type,
            error_message: error_message.map(str::to_string),
            duration_seconds: duration.as_secs_f64(),
        });
        self.total_render_attempts += 1;
        self.render_duration_seconds += duration.as_secs_f64();

        if success {
            self.final_success = true;
            if attempt_number == 1 {
                self.first_pass_success = true;
            }
        }

        match error_type {
            Some(ErrorCategory::Spatial) => self.spatial_errors += 1,
            Some(ErrorCategory::Timing) => self.timing_errors += 1,
            Some(ErrorCategory::ApiMisuse) | Some(ErrorCategory::Syntax) => self.api_errors += 1,
            Some(ErrorCategory::General) | None => {}
        }
    }

    pub fn finalize(&mut self) {
        let end = Local::now();
        self.total_duration_seconds = (end - self.start_time)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        self.end_time = Some(end);
    }

    pub fn summary(&self) -> String {
        let mark = |ok: bool| if ok { "yes" } else { "no" };
        [
            "=== VIDEO METRICS SUMMARY ===".to_string(),
            format!("Run ID: {}", self.run_id),
            format!("Video ID: {}", self.video_id),
            format!("Pipeline: {}", self.pipeline),
            format!("Model: {}", self.model),
            String::new(),
            "LLM Metrics:".to_string(),
            format!("  Total calls: {}", self.total_llm_calls),
            format!("  Total tokens: {}", self.total_tokens),
            format!("  Prompt tokens: {}", self.prompt_tokens),
            format!("  Completion tokens: {}", self.completion_tokens),
            format!("  Generation time: {:.1}s", self.generation_duration_seconds),
            String::new(),
            "Render Metrics:".to_string(),
            format!("  Total attempts: {}", self.total_render_attempts),
            format!("  First-pass success: {}", mark(self.first_pass_success)),
            format!("  Final success: {}", mark(self.final_success)),
            String::new(),
            "Error Breakdown:".to_string(),
            format!("  Spatial errors: {}", self.spatial_errors),
            format!("  Timing errors: {}", self.timing_errors),
            format!("  API errors: {}", self.api_errors),
            String::new(),
            "Timing:".to_string(),
            format!("  Total duration: {:.1}s", self.total_duration_seconds),
            format!("  Generation: {:.1}s", self.generation_duration_seconds),
            format!("  Rendering: {:.1}s", self.render_duration_seconds),
        ]
        .join("\n")
    }

    /// Write `metrics.json` and `metrics_summary.txt` into `dir`.
    pub fn save(&self, dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let json = serde_json::to_string_pretty(self).context("Failed to serialize metrics")?;
        std::fs::write(dir.join(METRICS_FILE), json)
            .with_context(|| format!("Failed to write {}", METRICS_FILE))?;
        std::fs::write(dir.join(SUMMARY_FILE), self.summary())
            .with_context(|| format!("Failed to write {}", SUMMARY_FILE))?;
        Ok(())
    }
}
