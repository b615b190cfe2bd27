//! Scene generation: the planner, coder and checker exchanges that happen
//! before the first render.
//!
//! Both modes run their checker loop on its own budget; nothing here spends
//! render attempts.

use super::plan::{parse_acts, Act};
use super::{PipelineMode, TrackedService};
use crate::llm::models::{ACT_MAX_TOKENS, CHECK_MAX_TOKENS, CODE_MAX_TOKENS, PLAN_MAX_TOKENS};
use crate::llm::prompts::{
    act_checker_user_message, act_user_message, checker_fix_user_message, checker_user_message,
    coder_user_message,
};
use crate::llm::{
    parse_check_verdict, strip_code_fences, CheckVerdict, GenerationRequest, GenerationService,
    PromptLibrary,
};
use tracing::{info, warn};

const FIRST_ACT_CONTEXT: &str = "# This is ACT 1: no prior context yet.";
const ACT_BANNER_RULE: &str = "───────────────";
const BODY_INDENT: &str = "        ";

/// Checker budgets and the scene class collated acts are wrapped in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSettings {
    pub checker_max_rounds: usize,
    pub act_max_attempts: usize,
    pub scene_class: String,
}

/// Code produced for one act.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActSource {
    pub act: Act,
    pub source: String,
    pub approved: bool,
    pub attempts: usize,
}

/// A plan and the script generated from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub plan: String,
    pub source: String,
    /// Per-act results; empty for single-pass generation
    pub acts: Vec<ActSource>,
}

/// Generate a scene script from a topic description.
pub async fn generate<S: GenerationService>(
    llm: &mut TrackedService<'_, S>,
    prompts: &PromptLibrary,
    settings: &GenerationSettings,
    mode: PipelineMode,
    description: &str,
) -> anyhow::Result<Generated> {
    info!(mode = %mode, "planning scene");
    let plan = llm
        .complete(GenerationRequest::new(
            &prompts.planner,
            description,
            "plan",
            PLAN_MAX_TOKENS,
        ))
        .await?
        .trim()
        .to_string();

    match mode {
        PipelineMode::SinglePass => {
            let source = code_from_plan(llm, prompts, settings, &plan).await?;
            Ok(Generated {
                plan,
                source,
                acts: Vec::new(),
            })
        }
        PipelineMode::MultiPass => multi_pass(llm, prompts, settings, plan).await,
    }
}

/// Coder then checker rounds; a rejection before the last round triggers a fix.
async fn code_from_plan<S: GenerationService>(
    llm: &mut TrackedService<'_, S>,
    prompts: &PromptLibrary,
    settings: &GenerationSettings,
    plan: &str,
) -> anyhow::Result<String> {
    info!("generating code from plan");
    let mut code = strip_code_fences(
        &llm.complete(GenerationRequest::new(
            &prompts.coder,
            coder_user_message(plan),
            "code",
            CODE_MAX_TOKENS,
        ))
        .await?,
    );

    let rounds = settings.checker_max_rounds;
    for round in 1..=rounds {
        let response = llm
            .complete(GenerationRequest::new(
                &prompts.checker,
                checker_user_message(&code, plan),
                "check",
                CHECK_MAX_TOKENS,
            ))
            .await?;

        match parse_check_verdict(&response) {
            CheckVerdict::Approved => {
                info!(round, "checker approved code");
                break;
            }
            CheckVerdict::Rejected { feedback } => {
                warn!(
                    round,
                    rounds,
                    feedback = %crate::util::truncate(&feedback, 300),
                    "checker found issues"
                );
                if round < rounds {
                    code = strip_code_fences(
                        &llm.complete(GenerationRequest::new(
                            &prompts.coder,
                            checker_fix_user_message(plan, &code, &feedback),
                            "fix_checker_feedback",
                            CODE_MAX_TOKENS,
                        ))
                        .await?,
                    );
                }
            }
        }
    }

    Ok(code)
}

async fn multi_pass<S: GenerationService>(
    llm: &mut TrackedService<'_, S>,
    prompts: &PromptLibrary,
    settings: &GenerationSettings,
    plan: String,
) -> anyhow::Result<Generated> {
    let acts = parse_acts(&plan);
    if acts.is_empty() {
        warn!("plan has no acts; falling back to single-pass code generation");
        let source = code_from_plan(llm, prompts, settings, &plan).await?;
        return Ok(Generated {
            plan,
            source,
            acts: Vec::new(),
        });
    }
    info!(acts = acts.len(), "plan parsed");

    let mut results = Vec::with_capacity(acts.len());
    let mut prior_context = FIRST_ACT_CONTEXT.to_string();
    for act in acts {
        let result = generate_act(llm, prompts, settings, &plan, act, &prior_context).await?;
        prior_context = format!("# Previous acts created these variables:\n{}\n", result.source);
        results.push(result);
    }

    Ok(Generated {
        source: collate(&settings.scene_class, &results),
        plan,
        acts: results,
    })
}

/// Generate+check rounds for one act. Rejection feedback is folded into the
/// act description for the next round; an act never approved keeps its last
/// version.
async fn generate_act<S: GenerationService>(
    llm: &mut TrackedService<'_, S>,
    prompts: &PromptLibrary,
    settings: &GenerationSettings,
    plan: &str,
    act: Act,
    prior_context: &str,
) -> anyhow::Result<ActSource> {
    let max_attempts = settings.act_max_attempts.max(1);
    let mut description = act.description.clone();
    let mut source = String::new();

    for attempt in 1..=max_attempts {
        info!(act = act.number, name = %act.name, attempt, max_attempts, "generating act");
        source = strip_code_fences(
            &llm.complete(GenerationRequest::new(
                &prompts.act_coder,
                act_user_message(plan, act.number, &act.name, &description, prior_context),
                format!("code_act{}", act.number),
                ACT_MAX_TOKENS,
            ))
            .await?,
        );

        let response = llm
            .complete(GenerationRequest::new(
                &prompts.checker,
                act_checker_user_message(&source, &description),
                "check",
                CHECK_MAX_TOKENS,
            ))
            .await?;

        match parse_check_verdict(&response) {
            CheckVerdict::Approved => {
                info!(act = act.number, attempt, "act approved");
                return Ok(ActSource {
                    act,
                    source,
                    approved: true,
                    attempts: attempt,
                });
            }
            CheckVerdict::Rejected { feedback } => {
                warn!(
                    act = act.number,
                    attempt,
                    feedback = %crate::util::truncate(&feedback, 200),
                    "act rejected"
                );
                if attempt < max_attempts {
                    description.push_str(&format!(
                        "\n\nPREVIOUS ATTEMPT HAD ISSUES:\n{}\nFix these issues.",
                        feedback
                    ));
                }
            }
        }
    }

    warn!(
        act = act.number,
        max_attempts, "act not approved; using last version"
    );
    Ok(ActSource {
        act,
        source,
        approved: false,
        attempts: max_attempts,
    })
}

/// Join per-act code into one scene class.
pub fn collate(scene_class: &str, acts: &[ActSource]) -> String {
    let mut scene = format!(
        "from manimlib import *\n\nclass {}(Scene):\n    def construct(self):\n",
        scene_class
    );

    for (index, act) in acts.iter().enumerate() {
        let body = act
            .source
            .lines()
            .filter(|line| {
                let trimmed = line.trim_start();
                !trimmed.starts_with("from ") && !trimmed.starts_with("import ")
            })
            .map(|line| {
                if line.trim().is_empty() {
                    String::new()
                } else {
                    format!("{}{}", BODY_INDENT, line)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        scene.push_str(&format!(
            "\n{}# ── Act {}: {} {}\n",
            BODY_INDENT,
            index + 1,
            act.act.name,
            ACT_BANNER_RULE
        ));
        scene.push_str(&body);
        scene.push('\n');
    }

    scene
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::VideoMetrics;
    use crate::pipeline::fakes::ScriptedService;

    fn settings() -> GenerationSettings {
        GenerationSettings {
            checker_max_rounds: 2,
            act_max_attempts: 3,
            scene_class: "GeneratedScene".to_string(),
        }
    }

    const TWO_ACT_PLAN: &str = "TITLE: T\nACT 1: Intro (~5s)\n- title\nCLOSING: (~3s)\n- bye";

    fn metrics() -> VideoMetrics {
        VideoMetrics::new("t", "d", PipelineMode::SinglePass, "m")
    }

    #[tokio::test]
    async fn single_pass_approved_first_round() {
        let service = ScriptedService::new(["the plan", "```python\nscene()\n```", "APPROVED"]);
        let mut m = metrics();
        let mut llm = TrackedService::new(&service, &mut m);

        let prompts = PromptLibrary::default();
        let out = generate(&mut llm, &prompts, &settings(), PipelineMode::SinglePass, "topic")
            .await
            .unwrap();

        assert_eq!(out.plan, "the plan");
        assert_eq!(out.source, "scene()");
        assert!(out.acts.is_empty());
        assert_eq!(service.purposes(), vec!["plan", "code", "check"]);
        assert_eq!(service.request(0).user, "topic");
        assert_eq!(service.request(1).max_tokens, CODE_MAX_TOKENS);
    }

    #[tokio::test]
    async fn plan_and_code_come_from_separate_calls() {
        let plan = "=== PLAN ===\nACT 1: Intro (~5s)\n=== CODE ===\nnot_code()";
        let service = ScriptedService::new([plan, "scene()", "APPROVED"]);
        let mut m = metrics();
        let mut llm = TrackedService::new(&service, &mut m);

        let prompts = PromptLibrary::default();
        let out = generate(&mut llm, &prompts, &settings(), PipelineMode::SinglePass, "topic")
            .await
            .unwrap();

        assert_eq!(out.plan, plan);
        assert_eq!(out.source, "scene()");
        assert!(service.request(1).user.contains(plan));
    }

    #[tokio::test]
    async fn single_pass_fixes_once_then_stops_at_round_budget() {
        let service = ScriptedService::new([
            "plan",
            "v1",
            "ISSUES FOUND\n1. overlap",
            "v2",
            "ISSUES FOUND\n1. still overlap",
        ]);
        let mut m = metrics();
        let mut llm = TrackedService::new(&service, &mut m);

        let prompts = PromptLibrary::default();
        let out = generate(&mut llm, &prompts, &settings(), PipelineMode::SinglePass, "topic")
            .await
            .unwrap();

        assert_eq!(out.source, "v2");
        assert_eq!(
            service.purposes(),
            vec!["plan", "code", "check", "fix_checker_feedback", "check"]
        );
        assert!(service
            .request(3)
            .user
            .contains("CHECKER FEEDBACK (fix these issues):\nISSUES FOUND\n1. overlap"));
        assert_eq!(service.remaining(), 0);
    }

    #[tokio::test]
    async fn multi_pass_generates_each_act_and_collates() {
        let service = ScriptedService::new([
            TWO_ACT_PLAN,
            "from manimlib import *\ntitle = Text('Hi')\nself.play(Write(title))",
            "APPROVED",
            "self.play(FadeOut(title))",
            "APPROVED",
        ]);
        let mut m = metrics();
        let mut llm = TrackedService::new(&service, &mut m);

        let prompts = PromptLibrary::default();
        let out = generate(&mut llm, &prompts, &settings(), PipelineMode::MultiPass, "topic")
            .await
            .unwrap();

        assert_eq!(
            service.purposes(),
            vec!["plan", "code_act1", "check", "code_act2", "check"]
        );
        assert_eq!(out.acts.len(), 2);
        assert!(out.acts.iter().all(|a| a.approved && a.attempts == 1));

        let second_act_prompt = service.request(3).user;
        assert!(second_act_prompt.contains("GENERATING ACT 2: Closing"));
        assert!(second_act_prompt.contains(
            "# Previous acts created these variables:\nfrom manimlib import *\ntitle = Text('Hi')"
        ));
        assert!(service.request(1).user.contains(FIRST_ACT_CONTEXT));

        assert!(out.source.starts_with(
            "from manimlib import *\n\nclass GeneratedScene(Scene):\n    def construct(self):\n"
        ));
        assert!(out
            .source
            .contains("        # ── Act 1: Intro ───────────────\n        title = Text('Hi')\n"));
        assert!(out.source.contains(
            "        # ── Act 2: Closing ───────────────\n        self.play(FadeOut(title))\n"
        ));
        assert_eq!(out.source.matches("from manimlib import *").count(), 1);
    }

    #[tokio::test]
    async fn multi_pass_feedback_accumulates_and_last_version_is_kept() {
        let service = ScriptedService::new([
            "ACT 1: Only (~5s)\n- do it",
            "a1",
            "ISSUES FOUND: first",
            "a2",
            "ISSUES FOUND: second",
            "a3",
            "ISSUES FOUND: third",
        ]);
        let mut m = metrics();
        let mut llm = TrackedService::new(&service, &mut m);

        let prompts = PromptLibrary::default();
        let out = generate(&mut llm, &prompts, &settings(), PipelineMode::MultiPass, "topic")
            .await
            .unwrap();

        assert_eq!(out.acts.len(), 1);
        assert!(!out.acts[0].approved);
        assert_eq!(out.acts[0].attempts, 3);
        assert_eq!(out.acts[0].source, "a3");

        let third = service.request(5).user;
        assert!(third
            .contains("PREVIOUS ATTEMPT HAD ISSUES:\nISSUES FOUND: first\nFix these issues."));
        assert!(third
            .contains("PREVIOUS ATTEMPT HAD ISSUES:\nISSUES FOUND: second\nFix these issues."));
        assert!(!third.contains("third"));
    }

    #[tokio::test]
    async fn multi_pass_without_acts_falls_back() {
        let service = ScriptedService::new(["free-form plan", "scene()", "APPROVED"]);
        let mut m = metrics();
        let mut llm = TrackedService::new(&service, &mut m);

        let prompts = PromptLibrary::default();
        let out = generate(&mut llm, &prompts, &settings(), PipelineMode::MultiPass, "topic")
            .await
            .unwrap();

        assert_eq!(out.source, "scene()");
        assert_eq!(service.purposes(), vec!["plan", "code", "check"]);
    }

    #[tokio::test]
    async fn service_failure_propagates() {
        let service = ScriptedService::new(["plan"]);
        let mut m = metrics();
        let mut llm = TrackedService::new(&service, &mut m);

        let prompts = PromptLibrary::default();
        let mode = PipelineMode::SinglePass;
        let result = generate(&mut llm, &prompts, &settings(), mode, "topic").await;
        assert!(result.is_err());
    }

    #[test]
    fn collate_blank_lines_are_not_indented() {
        let act = ActSource {
            act: Act {
                number: 1,
                name: "A".into(),
                duration_secs: 1,
                description: String::new(),
            },
            source: "import numpy as np\na = 1\n\nb = 2".into(),
            approved: true,
            attempts: 1,
        };
        let scene = collate("GeneratedScene", &[act]);
        assert!(scene.ends_with("        a = 1\n\n        b = 2\n"));
        assert!(!scene.contains("numpy"));
    }
}
