//! Scripted collaborators for driving the pipeline in tests.

use super::render::{RenderOutcome, Renderer};
use crate::llm::{GenerationRequest, GenerationService, LlmResponse};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

/// Returns canned completions in order and records every request.
pub struct ScriptedService {
    responses: Mutex<VecDeque<String>>,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedService {
    pub fn new<I, T>(responses: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn purposes(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.purpose.clone())
            .collect()
    }

    pub fn request(&self, index: usize) -> GenerationRequest {
        self.requests.lock().unwrap()[index].clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

impl GenerationService for ScriptedService {
    async fn generate(&self, request: GenerationRequest) -> anyhow::Result<LlmResponse> {
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(content) => {
                self.requests.lock().unwrap().push(request);
                Ok(LlmResponse::text(content))
            }
            None => anyhow::bail!("script exhausted at {}", request.purpose),
        }
    }
}

/// Renders by replaying scripted outcomes; remembers each script it was given.
pub struct ScriptedRenderer {
    outcomes: Mutex<VecDeque<RenderOutcome>>,
    pub rendered: Mutex<Vec<String>>,
}

impl ScriptedRenderer {
    pub fn new(outcomes: impl IntoIterator<Item = RenderOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            rendered: Mutex::new(Vec::new()),
        }
    }

    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().unwrap().clone()
    }
}

impl Renderer for ScriptedRenderer {
    fn render(&self, scene_file: &Path, output_dir: &Path) -> RenderOutcome {
        let source = std::fs::read_to_string(scene_file).unwrap_or_default();
        self.rendered.lock().unwrap().push(source);
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| RenderOutcome::failure("no scripted outcome"));
        if let RenderOutcome::Success { artifact } = &outcome {
            let _ = std::fs::write(output_dir.join(artifact), b"mp4");
        }
        outcome
    }
}
