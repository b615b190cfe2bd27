//! Prompt text and the user messages built around it.
//!
//! Built-in prompts are compiled in. A TOML file named by `prompts_file` in
//! the config can replace any of them; keys it omits keep the built-in text.

use crate::diagnose::{Diagnosis, ErrorCategory, FixStrategy};
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

pub const PLANNER_SYSTEM: &str = r#"You are a master educational video planner for manimgl (3Blue1Brown's animation library).

Turn the user's topic into an execution-ready animation plan. You do NOT write code.

PRINCIPLES:
- One idea per act; build intuition before formality
- Show, don't state: every claim gets a visual
- At most 5-7 elements on screen at once
- Safe content zone is [-6, 6] x [-3, 3]
- Every act ends by fading out what the next act does not need
- Text uses Text() with Unicode math. LaTeX is not installed.

OUTPUT FORMAT (follow exactly):

TITLE: <video title>

ACT 1: <name> (~Xs)
- Goal: <what this act teaches>
- Mobjects: <specific objects with colors and positions>
- Animations: <step-by-step sequence with timing>
- Cleanup: <what gets faded out>

ACT 2: ...

CLOSING: (~Xs)
- Final message: <summary text>
- Cleanup: fade everything

TOTAL: ~Xs"#;

pub const CODER_SYSTEM: &str = r#"You are the coding stage of an animation pipeline: Planner -> Coder <-> Checker -> Render.

Implement the scene plan as complete, runnable manimgl code.

RULES:
1. Start with `from manimlib import *`; the class MUST be `GeneratedScene(Scene)`
2. Follow the plan's positions, colors and timing exactly
3. Use ShowCreation (never Create), Text with Unicode (never Tex/MathTex)
4. FadeIn takes `shift=`, not `direction=`; use `mob.animate.<method>(...)`
5. Text never sits on shapes, lines, axes or other text
6. Call self.wait() after text appears (at least 1s)
7. Clear all updaters before any FadeOut
8. Return ONLY runnable Python code: no markdown fences, no explanations"#;

pub const ACT_CODER_SYSTEM: &str = r#"You are generating code for a SINGLE ACT of a multi-act manimgl video.

OUTPUT RULES:
- Return ONLY raw Python code: NO class definition, NO imports, NO markdown fences
- Code at zero indent level (it is indented into construct() later)
- Use self.play(), self.wait(), self.add(), self.remove()

CONTEXT RULES:
- Variables from previous acts are in scope; reuse them directly
- Define anything new before using it
- End the act with cleanup: clear_updaters(), then FadeOut what is no longer needed
- For the closing act: fade everything out, show the summary text, wait, fade out

Use ShowCreation (never Create) and Text with Unicode (never Tex/MathTex)."#;

pub const CHECKER_SYSTEM: &str = r#"You are the checking stage of an animation pipeline: Planner -> Coder <-> Checker -> Render.

Verify the code implements the plan with zero overlapping text, zero stale objects and correct manimgl API usage.

HARD RULES (instant rejection):
- Tex(), MathTex() or any LaTeX class
- Create() instead of ShowCreation()
- self.camera.frame (community-edition API)
- Imports beyond manimlib, numpy, math

ALSO CHECK:
- Variables used before definition
- .set_value() on Text (use DecimalNumber)
- Updaters not cleared before FadeOut
- Labels placed at the same position (replace with FadeTransform)
- Objects outside [-7, 7] x [-4, 4]
- No self.wait() after text appears

RESPONSE FORMAT:

If the code passes ALL checks:
APPROVED

Otherwise:
ISSUES FOUND

1. [CATEGORY]: <specific problem>
   Location: <line/section>
   Fix: <exact change needed>

Priority: OVERLAPS > HARD RULE violations > temporal issues > API errors"#;

pub const FIX_PREAMBLE: &str = r#"You are an expert manimgl debugger. You will receive a manimgl script that failed to render and the error message.

Fix the code so it runs successfully. Return ONLY the fixed Python code: no markdown fences, no explanations.

---
"#;

pub const FULL_FIX_SYSTEM: &str = r#"You are an expert manimgl debugger. You will receive a manimgl script that failed to render and the error message.

Fix the code so it runs successfully. Rules:
- The class must be `GeneratedScene(Scene)` and the file must start with `from manimlib import *`
- NEVER use Tex/MathTex/LaTeX: use Text() with Unicode symbols
- Do not change the overall scene structure; only fix the error
- Return ONLY the fixed Python code: no markdown fences, no explanations

Common fixes:
- NameError: variable used before definition, or misspelled
- AttributeError: wrong method name; manimgl differs from community manim (Create -> ShowCreation, MathTex -> Text)
- TypeError: wrong argument names (FadeIn uses shift=UP*0.3, not direction=UP; Arrow uses buff=0)
- Updater not cleared before FadeOut: add .clear_updaters() first
- Object faded out twice: remove the duplicate FadeOut
- normalize() on a zero vector: guard the edge case"#;

pub const SYNTAX_FIXER: &str = r#"SYNTAX AND RUNTIME ERRORS

- NameError: find the misspelled or never-defined name and fix the spelling or define it before use
- AttributeError on Text with set_value: Text has no numeric value; use DecimalNumber or Integer
- TypeError on keyword arguments: use the manimgl signature (FadeIn(mob, shift=UP), not direction=)
- IndentationError/SyntaxError: repair the block structure without changing behaviour
- Updaters still attached at FadeOut: call .clear_updaters() before the animation"#;

pub const API_FIXER: &str = r#"API MISUSE (manimgl vs community manim)

- Create(...) -> ShowCreation(...)
- Tex/MathTex/TexText -> Text(...) with Unicode math (², √, π, θ, ≤). LaTeX is NOT installed.
- self.camera.frame -> self.frame
- .animate(...) -> .animate.<method>(...)
- Keep everything else unchanged"#;

pub const SPATIAL_FIXER: &str = r#"SPATIAL AND LAYOUT PROBLEMS

- Two texts sent to the same edge overlap: replace the old caption with FadeTransform(old, new) instead of stacking
- Labels on lines: offset with next_to(..., buff=0.3) perpendicular to the line, not on its center
- Keep every object inside [-6, 6] x [-3, 3]; scale down large shapes
- Never position text on top of shapes, axes or other text"#;

pub const TIMING_FIXER: &str = r#"TIMING AND PACING PROBLEMS

- Add self.wait(1) to self.wait(1.5) after every text or title appears
- Match each act's run_time + waits to the planned duration
- Avoid chains of self.play() calls with no pause between ideas"#;

/// Focus line appended to the specialised fix prompt.
pub fn strategy_focus(strategy: FixStrategy) -> &'static str {
    match strategy {
        FixStrategy::VariableFix => {
            "FOCUS: an undefined name. Fix the typo or define the variable before it is used."
        }
        FixStrategy::SyntaxFix => {
            "FOCUS: a Python-level error. Make the script run without changing what it shows."
        }
        FixStrategy::LatexReplacement => {
            "FOCUS: LaTeX is unavailable. Replace every Tex/MathTex/TexText with Text using Unicode."
        }
        FixStrategy::ApiFix => {
            "FOCUS: a community-manim API was used. Translate it to the manimgl equivalent."
        }
        FixStrategy::FadetransformFix => {
            "FOCUS: captions stacked on the same edge. Swap them with FadeTransform instead of adding new ones."
        }
        FixStrategy::SpatialFix => {
            "FOCUS: overlapping or off-screen objects. Reposition them so nothing collides."
        }
        FixStrategy::AddWaits => {
            "FOCUS: the scene is rushed. Add self.wait() after text and between ideas."
        }
        FixStrategy::TimingFix => {
            "FOCUS: pacing does not match the plan. Adjust run_time and waits."
        }
        FixStrategy::GeneralRetry => "FOCUS: read the traceback carefully and fix its root cause.",
    }
}

/// Every prompt the pipeline sends, overridable from TOML.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PromptLibrary {
    pub planner: String,
    pub coder: String,
    pub act_coder: String,
    pub checker: String,
    pub fix_preamble: String,
    pub full_fix: String,
    pub syntax_fixer: String,
    pub api_fixer: String,
    pub spatial_fixer: String,
    pub timing_fixer: String,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self {
            planner: PLANNER_SYSTEM.to_string(),
            coder: CODER_SYSTEM.to_string(),
            act_coder: ACT_CODER_SYSTEM.to_string(),
            checker: CHECKER_SYSTEM.to_string(),
            fix_preamble: FIX_PREAMBLE.to_string(),
            full_fix: FULL_FIX_SYSTEM.to_string(),
            syntax_fixer: SYNTAX_FIXER.to_string(),
            api_fixer: API_FIXER.to_string(),
            spatial_fixer: SPATIAL_FIXER.to_string(),
            timing_fixer: TIMING_FIXER.to_string(),
        }
    }
}

impl PromptLibrary {
    /// Built-in prompts, with overrides from `path` when given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompts file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse prompts file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn fixer_for(&self, category: ErrorCategory) -> Option<&str> {
        match category {
            ErrorCategory::Syntax => Some(&self.syntax_fixer),
            ErrorCategory::ApiMisuse => Some(&self.api_fixer),
            ErrorCategory::Spatial => Some(&self.spatial_fixer),
            ErrorCategory::Timing => Some(&self.timing_fixer),
            ErrorCategory::General => None,
        }
    }

    /// System prompt for a render fix. `general_retry` (or `force_full`)
    /// gets the full-context prompt; everything else gets the specialised
    /// fixer for the strategy's category.
    pub fn fix_system_prompt(&self, strategy: FixStrategy, force_full: bool) -> String {
        let fixer = strategy.category().and_then(|c| self.fixer_for(c));
        match fixer {
            Some(fixer) if !force_full => format!(
                "{}{}\n\n{}",
                self.fix_preamble,
                fixer,
                strategy_focus(strategy)
            ),
            _ => self.full_fix.clone(),
        }
    }
}

/// User message for a render fix: code, raw error, location and guidance.
pub fn fix_user_message(source: &str, error: &str, diagnosis: &Diagnosis) -> String {
    let mut msg = format!("BROKEN CODE:\n```python\n{}\n```\n\nERROR:\n{}\n\n", source, error);

    if let Some(line) = diagnosis.context.line {
        msg.push_str(&format!("ERROR LOCATION: Line {}\n", line));
    }
    if let Some(snippet) = &diagnosis.context.snippet {
        msg.push_str(&format!("CODE CONTEXT:\n{}\n\n", snippet));
    }

    let details = diagnosis.details();
    if let Some(name) = details.undefined_name() {
        msg.push_str(&format!(
            "ISSUE: Variable '{}' is not defined. Check for typos or missing definitions.\n",
            name
        ));
    } else if let Some(issue) = details.issue() {
        msg.push_str(&format!("LIKELY ISSUE: {}\n", issue));
    }

    msg.push_str("\nFix the code and return ONLY the corrected Python code.");
    msg
}

pub fn coder_user_message(plan: &str) -> String {
    format!(
        "SCENE PLAN:\n\n{}\n\nGenerate the complete scene code following this plan exactly.",
        plan
    )
}

pub fn checker_user_message(code: &str, plan: &str) -> String {
    format!("ORIGINAL PLAN:\n{}\n\nCODE TO CHECK:\n```python\n{}\n```", plan, code)
}

pub fn checker_fix_user_message(plan: &str, code: &str, feedback: &str) -> String {
    format!(
        "SCENE PLAN:\n\n{}\n\nCURRENT CODE:\n```python\n{}\n```\n\n\
         CHECKER FEEDBACK (fix these issues):\n{}\n\n\
         Fix all issues identified by the checker. Return the complete corrected scene code.",
        plan, code, feedback
    )
}

pub fn act_user_message(
    full_plan: &str,
    act_number: usize,
    act_name: &str,
    act_description: &str,
    prior_context: &str,
) -> String {
    format!(
        "FULL VIDEO PLAN:\n{}\n\nGENERATING ACT {}: {}\n\nACT DESCRIPTION:\n{}\n\n\
         CONTEXT FROM PREVIOUS ACTS (variables already in scope):\n{}\n\n\
         Generate the Python code for this act only. Raw code, no markdown fences.",
        full_plan, act_number, act_name, act_description, prior_context
    )
}

pub fn act_checker_user_message(code: &str, act_description: &str) -> String {
    format!(
        "CODE TO CHECK:\n```python\n{}\n```\n\nACT DESCRIPTION:\n{}",
        code, act_description
    )
}
