//! Render-retry orchestration.
//!
//! After generation the run is an explicit state machine:
//!
//! ```text
//! Rendering -> Succeeded
//!           -> Classifying -> Regenerating -> Rendering
//!                          -> Exhausted
//! ```
//!
//! Every render attempt (including the first) counts against
//! `max_render_attempts`. Every failure is diagnosed, even the last one, so
//! metrics and the attempt history always carry a category.

use super::artifacts::ArtifactDir;
use super::generate::{generate, GenerationSettings};
use super::render::{FailureReport, RenderOutcome, Renderer};
use super::{PipelineMode, TrackedService};
use crate::config::Config;
use crate::diagnose::{diagnose, Diagnosis};
use crate::error::PipelineError;
use crate::llm::models::CODE_MAX_TOKENS;
use crate::llm::prompts::fix_user_message;
use crate::llm::{strip_code_fences, GenerationRequest, GenerationService, PromptLibrary};
use crate::metrics::VideoMetrics;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Budgets and switches for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub max_render_attempts: usize,
    pub checker_max_rounds: usize,
    pub act_max_attempts: usize,
    pub always_full_fix_prompt: bool,
    pub mode: PipelineMode,
    pub scene_class: String,
    /// Recorded in metrics
    pub model: String,
    /// Print the plan and every source version to stdout
    pub echo_sources: bool,
}

impl RunSettings {
    pub fn from_config(config: &Config, mode: PipelineMode) -> Self {
        Self {
            max_render_attempts: config.max_render_attempts,
            checker_max_rounds: config.checker_max_rounds,
            act_max_attempts: config.act_max_attempts,
            always_full_fix_prompt: config.always_full_fix_prompt,
            mode,
            scene_class: config.scene_class.clone(),
            model: config.model.clone(),
            echo_sources: false,
        }
    }

    fn generation(&self) -> GenerationSettings {
        GenerationSettings {
            checker_max_rounds: self.checker_max_rounds,
            act_max_attempts: self.act_max_attempts,
            scene_class: self.scene_class.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success { artifact: PathBuf },
    Failure {
        report: FailureReport,
        diagnosis: Diagnosis,
    },
}

/// One render of one source version.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    /// 1-based
    pub number: usize,
    pub source: String,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Succeeded {
        artifact: PathBuf,
        attempts: Vec<Attempt>,
    },
    Exhausted {
        last_failure: FailureReport,
        attempts: Vec<Attempt>,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded { .. })
    }

    pub fn attempts(&self) -> &[Attempt] {
        match self {
            RunOutcome::Succeeded { attempts, .. } | RunOutcome::Exhausted { attempts, .. } => {
                attempts
            }
        }
    }
}

/// What a finished run hands back to the caller.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub plan: String,
    pub outcome: RunOutcome,
    pub metrics: VideoMetrics,
    pub output_dir: PathBuf,
}

enum State {
    Rendering {
        attempt: usize,
        source: String,
    },
    Classifying {
        attempt: usize,
        source: String,
        message: String,
        elapsed: Duration,
    },
    Regenerating {
        attempt: usize,
        report: FailureReport,
        diagnosis: Diagnosis,
    },
    Succeeded {
        artifact: PathBuf,
    },
    Exhausted {
        last_failure: FailureReport,
    },
}

pub struct Orchestrator<'a, S, R> {
    service: &'a S,
    renderer: &'a R,
    prompts: &'a PromptLibrary,
    settings: RunSettings,
    artifacts: ArtifactDir,
}

impl<'a, S: GenerationService, R: Renderer> Orchestrator<'a, S, R> {
    pub fn new(
        service: &'a S,
        renderer: &'a R,
        prompts: &'a PromptLibrary,
        settings: RunSettings,
        artifacts: ArtifactDir,
    ) -> Self {
        Self {
            service,
            renderer,
            prompts,
            settings,
            artifacts,
        }
    }

    /// Plan, generate, then render until success or the attempt budget runs out.
    ///
    /// Metrics are written to the output directory whether or not the run
    /// succeeds; a generation-service failure is returned as an error after
    /// that.
    pub async fn run(self, description: &str) -> anyhow::Result<RunReport> {
        let description = description.trim();
        if description.is_empty() {
            return Err(PipelineError::EmptyDescription.into());
        }

        let mut metrics = VideoMetrics::new(
            self.artifacts.name(),
            description,
            self.settings.mode,
            self.settings.model.clone(),
        );
        info!(
            run_id = %metrics.run_id,
            output = %self.artifacts.path().display(),
            mode = %self.settings.mode,
            "starting run"
        );

        let result = self.drive(description, &mut metrics).await;

        metrics.finalize();
        if let Err(e) = metrics.save(self.artifacts.path()) {
            warn!(error = %format!("{:#}", e), "could not write metrics");
        }

        let (plan, outcome) = result?;
        info!(
            success = outcome.is_success(),
            attempts = outcome.attempts().len(),
            tokens = metrics.total_tokens,
            duration_s = metrics.total_duration_seconds,
            "run finished"
        );
        Ok(RunReport {
            plan,
            outcome,
            metrics,
            output_dir: self.artifacts.path().to_path_buf(),
        })
    }

    async fn drive(
        &self,
        description: &str,
        metrics: &mut VideoMetrics,
    ) -> anyhow::Result<(String, RunOutcome)> {
        let mut llm = TrackedService::new(self.service, metrics);

        let generated = generate(
            &mut llm,
            self.prompts,
            &self.settings.generation(),
            self.settings.mode,
            description,
        )
        .await?;
        self.artifacts.save_plan(&generated.plan)?;
        if self.settings.echo_sources {
            println!("=== PLAN ===\n{}\n", generated.plan);
        }

        let outcome = self.render_loop(&mut llm, generated.source).await?;
        Ok((generated.plan, outcome))
    }

    async fn render_loop(
        &self,
        llm: &mut TrackedService<'_, S>,
        source: String,
    ) -> anyhow::Result<RunOutcome> {
        let max_attempts = self.settings.max_render_attempts.max(1);
        let mut attempts: Vec<Attempt> = Vec::new();
        let mut state = State::Rendering { attempt: 1, source };

        loop {
            state = match state {
                State::Rendering { attempt, source } => {
                    let scene = self.artifacts.write_scene(&source, attempt)?;
                    if self.settings.echo_sources {
                        println!("=== SCENE v{} ===\n{}\n", attempt, source);
                    }
                    info!(attempt, max_attempts, scene = %scene.display(), "rendering");

                    let started = Instant::now();
                    let outcome = self.renderer.render(&scene, self.artifacts.path());
                    let elapsed = started.elapsed();

                    match outcome {
                        RenderOutcome::Success { artifact } => {
                            llm.metrics_mut()
                                .record_render_attempt(attempt, true, None, None, elapsed);
                            attempts.push(Attempt {
                                number: attempt,
                                source,
                                outcome: AttemptOutcome::Success {
                                    artifact: artifact.clone(),
                                },
                            });
                            State::Succeeded { artifact }
                        }
                        RenderOutcome::Failure { message } => {
                            warn!(
                                attempt,
                                error = %crate::util::truncate(&message, 300),
                                "render failed"
                            );
                            State::Classifying {
                                attempt,
                                source,
                                message,
                                elapsed,
                            }
                        }
                    }
                }

                State::Classifying {
                    attempt,
                    source,
                    message,
                    elapsed,
                } => {
                    let diagnosis = diagnose(&message, &source);
                    info!(
                        attempt,
                        category = diagnosis.category().as_str(),
                        confidence = diagnosis.confidence(),
                        strategy = diagnosis.strategy.as_str(),
                        stage = diagnosis.stage.unwrap_or("fallback"),
                        "classified failure"
                    );
                    llm.metrics_mut().record_render_attempt(
                        attempt,
                        false,
                        Some(diagnosis.category()),
                        Some(&message),
                        elapsed,
                    );

                    let report = FailureReport { message, source };
                    attempts.push(Attempt {
                        number: attempt,
                        source: report.source.clone(),
                        outcome: AttemptOutcome::Failure {
                            report: report.clone(),
                            diagnosis: diagnosis.clone(),
                        },
                    });

                    if attempt >= max_attempts {
                        State::Exhausted {
                            last_failure: report,
                        }
                    } else {
                        State::Regenerating {
                            attempt,
                            report,
                            diagnosis,
                        }
                    }
                }

                State::Regenerating {
                    attempt,
                    report,
                    diagnosis,
                } => {
                    info!(
                        attempt,
                        strategy = diagnosis.strategy.as_str(),
                        "requesting fix"
                    );
                    let request = GenerationRequest::new(
                        self.prompts.fix_system_prompt(
                            diagnosis.strategy,
                            self.settings.always_full_fix_prompt,
                        ),
                        fix_user_message(&report.source, &report.message, &diagnosis),
                        format!(
                            "fix_{}_{}",
                            diagnosis.category().as_str(),
                            diagnosis.strategy.as_str()
                        ),
                        CODE_MAX_TOKENS,
                    );
                    let fixed = strip_code_fences(&llm.complete(request).await?);
                    State::Rendering {
                        attempt: attempt + 1,
                        source: fixed,
                    }
                }

                State::Succeeded { artifact } => {
                    info!(artifact = %artifact.display(), "render succeeded");
                    return Ok(RunOutcome::Succeeded { artifact, attempts });
                }

                State::Exhausted { last_failure } => {
                    warn!(max_attempts, "render attempts exhausted");
                    return Ok(RunOutcome::Exhausted {
                        last_failure,
                        attempts,
                    });
                }
            };
        }
    }
}
