//! Rule-based classification of renderer failures.
//!
//! Classification is an ordered table of stages. Each stage looks at the
//! error message and the failing source and either returns a verdict or
//! passes. The first verdict wins; a failure no stage recognizes is
//! [`ErrorCategory::General`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Closed taxonomy of renderer failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Syntax,
    ApiMisuse,
    Spatial,
    Timing,
    General,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 5] = [
        ErrorCategory::Syntax,
        ErrorCategory::ApiMisuse,
        ErrorCategory::Spatial,
        ErrorCategory::Timing,
        ErrorCategory::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Syntax => "syntax",
            ErrorCategory::ApiMisuse => "api",
            ErrorCategory::Spatial => "spatial",
            ErrorCategory::Timing => "timing",
            ErrorCategory::General => "general",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Python runtime errors that point at a defect in the generated script.
pub(crate) const RUNTIME_ERROR_NAMES: [&str; 8] = [
    "NameError",
    "AttributeError",
    "TypeError",
    "IndentationError",
    "SyntaxError",
    "KeyError",
    "IndexError",
    "ValueError",
];

/// Source literals that betray the wrong animation API.
///
/// `Create(` should be `ShowCreation(`, LaTeX constructors are unavailable,
/// `self.camera.frame` is the community-edition camera, `direction=` is not a
/// `FadeIn` keyword and `.animate(` must be `.animate.<method>(`.
pub(crate) const WRONG_API_PATTERNS: [&str; 7] = [
    "Create(",
    "MathTex",
    "Tex(",
    "TexText",
    "self.camera.frame",
    "direction=",
    ".animate(",
];

/// Source literals that turn an `AttributeError` into an API problem.
const ATTRIBUTE_API_PATTERNS: [&str; 3] = ["self.camera.frame", "Tex(", "Create("];

const FRAMEWORK_NOUNS: [&str; 4] = ["manimlib", "mobject", "vmobject", "scene"];

const FRAMEWORK_SPATIAL_KEYWORDS: [&str; 4] = ["overlap", "position", "bounds", "off screen"];

pub(crate) const SPATIAL_KEYWORDS: [&str; 12] = [
    "overlap",
    "collision",
    "off-screen",
    "off screen",
    "bounds",
    "too close",
    "same position",
    "alignment",
    "crowded",
    "clipping",
    "label on line",
    "text on shape",
];

pub(crate) const TIMING_KEYWORDS: [&str; 9] = [
    "too fast",
    "too slow",
    "missing wait",
    "duration",
    "pacing",
    "rushed",
    "timing",
    "wait time",
    "run_time",
];

/// Positioning call that stacks every caption on the same bottom edge.
pub(crate) const BOTTOM_EDGE_CALL: &str = ".to_edge(DOWN)";

/// Known API tokens as whole words, so `Text` does not read as `Tex`.
pub(crate) fn api_token_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:Create|MathTex|TexText|Tex)\b|camera\.frame").ok())
        .as_ref()
}

fn markup_keyword_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:MathTex|TexText|Tex)\b|(?i:latex)").ok())
        .as_ref()
}

fn text_type_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bText\b").ok()).as_ref()
}

fn matches(re: Option<&Regex>, haystack: &str) -> bool {
    re.map(|re| re.is_match(haystack)).unwrap_or(false)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// `Text.set_value(...)`: a numeric setter called on a plain text object.
pub(crate) fn is_text_setter_misuse(message: &str) -> bool {
    message.contains("set_value") && matches(text_type_re(), message)
}

pub(crate) fn count_bottom_edge_calls(source: &str) -> usize {
    source.matches(BOTTOM_EDGE_CALL).count()
}

/// Inputs shared by every stage.
pub(crate) struct Evidence<'a> {
    pub(crate) message: &'a str,
    pub(crate) lower: String,
    pub(crate) source: &'a str,
}

impl<'a> Evidence<'a> {
    pub(crate) fn new(message: &'a str, source: &'a str) -> Self {
        Self {
            message,
            lower: message.to_lowercase(),
            source,
        }
    }
}

/// One classification rule.
pub(crate) struct Stage {
    pub(crate) name: &'static str,
    pub(crate) verdict: fn(&Evidence<'_>) -> Option<ErrorCategory>,
}

/// Classification rules in priority order.
pub(crate) const STAGES: &[Stage] = &[
    Stage {
        name: "exception_name",
        verdict: exception_name_stage,
    },
    Stage {
        name: "import_error",
        verdict: import_error_stage,
    },
    Stage {
        name: "source_pattern",
        verdict: source_pattern_stage,
    },
    Stage {
        name: "framework_keyword",
        verdict: framework_keyword_stage,
    },
    Stage {
        name: "spatial_keyword",
        verdict: spatial_keyword_stage,
    },
    Stage {
        name: "timing_keyword",
        verdict: timing_keyword_stage,
    },
    Stage {
        name: "structural_heuristic",
        verdict: structural_heuristic_stage,
    },
];

fn exception_name_stage(ev: &Evidence<'_>) -> Option<ErrorCategory> {
    if !contains_any(ev.message, &RUNTIME_ERROR_NAMES) {
        return None;
    }

    let attribute_error = ev.message.contains("AttributeError");
    if attribute_error && is_text_setter_misuse(ev.message) {
        return Some(ErrorCategory::Syntax);
    }

    if matches(api_token_re(), ev.message) {
        return Some(ErrorCategory::ApiMisuse);
    }

    if attribute_error && contains_any(ev.source, &ATTRIBUTE_API_PATTERNS) {
        return Some(ErrorCategory::ApiMisuse);
    }

    Some(ErrorCategory::Syntax)
}

fn import_error_stage(ev: &Evidence<'_>) -> Option<ErrorCategory> {
    if !ev.message.contains("ImportError") && !ev.message.contains("ModuleNotFoundError") {
        return None;
    }
    if matches(markup_keyword_re(), ev.message) {
        Some(ErrorCategory::ApiMisuse)
    } else {
        Some(ErrorCategory::Syntax)
    }
}

fn source_pattern_stage(ev: &Evidence<'_>) -> Option<ErrorCategory> {
    contains_any(ev.source, &WRONG_API_PATTERNS).then_some(ErrorCategory::ApiMisuse)
}

fn framework_keyword_stage(ev: &Evidence<'_>) -> Option<ErrorCategory> {
    if !contains_any(&ev.lower, &FRAMEWORK_NOUNS) {
        return None;
    }
    if contains_any(&ev.lower, &FRAMEWORK_SPATIAL_KEYWORDS) {
        Some(ErrorCategory::Spatial)
    } else {
        Some(ErrorCategory::ApiMisuse)
    }
}

fn spatial_keyword_stage(ev: &Evidence<'_>) -> Option<ErrorCategory> {
    contains_any(&ev.lower, &SPATIAL_KEYWORDS).then_some(ErrorCategory::Spatial)
}

fn timing_keyword_stage(ev: &Evidence<'_>) -> Option<ErrorCategory> {
    contains_any(&ev.lower, &TIMING_KEYWORDS).then_some(ErrorCategory::Timing)
}

fn structural_heuristic_stage(ev: &Evidence<'_>) -> Option<ErrorCategory> {
    // Updaters left running on a faded-out object.
    if ev.source.contains("FadeOut")
        && ev.source.contains("add_updater")
        && !ev.source.contains("clear_updaters")
    {
        return Some(ErrorCategory::Syntax);
    }

    if count_bottom_edge_calls(ev.source) > 1 && !ev.source.contains("FadeTransform") {
        return Some(ErrorCategory::Spatial);
    }

    None
}

/// Classify a failure, also reporting which stage decided it.
///
/// The stage name is `None` when the failure fell through to `General`.
pub fn classify_with_stage(message: &str, source: &str) -> (ErrorCategory, Option<&'static str>) {
    let evidence = Evidence::new(message, source);
    STAGES
        .iter()
        .find_map(|stage| (stage.verdict)(&evidence).map(|category| (category, Some(stage.name))))
        .unwrap_or((ErrorCategory::General, None))
}

/// Classify a failure into one category.
pub fn classify(message: &str, source: &str) -> ErrorCategory {
    classify_with_stage(message, source).0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(name: &str) -> &'static Stage {
        STAGES.iter().find(|s| s.name == name).unwrap()
    }

    fn run(name: &str, message: &str, source: &str) -> Option<ErrorCategory> {
        (stage(name).verdict)(&Evidence::new(message, source))
    }

    #[test]
    fn stage_order_is_fixed() {
        let names: Vec<&str> = STAGES.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "exception_name",
                "import_error",
                "source_pattern",
                "framework_keyword",
                "spatial_keyword",
                "timing_keyword",
                "structural_heuristic",
            ]
        );
    }

    #[test]
    fn exception_stage_prefers_api_tokens() {
        assert_eq!(
            run("exception_name", "NameError: name 'Create' is not defined", ""),
            Some(ErrorCategory::ApiMisuse)
        );
        assert_eq!(
            run("exception_name", "NameError: name 'TexText' is not defined", ""),
            Some(ErrorCategory::ApiMisuse)
        );
        assert_eq!(
            run("exception_name", "NameError: name 'grpah' is not defined", ""),
            Some(ErrorCategory::Syntax)
        );
    }

    #[test]
    fn text_is_not_mistaken_for_tex() {
        assert_eq!(
            run(
                "exception_name",
                "AttributeError: 'Text' object has no attribute 'set_value'",
                "t = Text('x')\nt.set_value(5)"
            ),
            Some(ErrorCategory::Syntax)
        );
        assert_eq!(
            run("exception_name", "TypeError: Text() got an unexpected keyword", ""),
            Some(ErrorCategory::Syntax)
        );
    }

    #[test]
    fn attribute_error_uses_source_for_api_hint() {
        assert_eq!(
            run(
                "exception_name",
                "AttributeError: 'Scene' object has no attribute 'camera'",
                "self.camera.frame.move_to(ORIGIN)"
            ),
            Some(ErrorCategory::ApiMisuse)
        );
        assert_eq!(
            run(
                "exception_name",
                "AttributeError: 'Square' object has no attribute 'foo'",
                "sq.foo()"
            ),
            Some(ErrorCategory::Syntax)
        );
    }

    #[test]
    fn source_api_hint_is_ignored_for_non_attribute_errors() {
        // Named exceptions decide before the source-pattern stage runs.
        assert_eq!(
            classify(
                "TypeError: FadeIn() got an unexpected keyword argument 'direction'",
                "self.play(FadeIn(mob, direction=UP))"
            ),
            ErrorCategory::Syntax
        );
    }

    #[test]
    fn import_stage_splits_on_markup() {
        assert_eq!(
            run("import_error", "ImportError: cannot import name 'MathTex'", ""),
            Some(ErrorCategory::ApiMisuse)
        );
        assert_eq!(
            run("import_error", "ModuleNotFoundError: No module named 'latex2svg'", ""),
            Some(ErrorCategory::ApiMisuse)
        );
        assert_eq!(
            run("import_error", "ModuleNotFoundError: No module named 'numpyy'", ""),
            Some(ErrorCategory::Syntax)
        );
        assert_eq!(run("import_error", "plain failure", ""), None);
    }

    #[test]
    fn source_stage_flags_wrong_api_calls() {
        for source in [
            "self.play(Create(c))",
            "eq = MathTex('x')",
            "t = Tex('x')",
            "self.camera.frame.scale(2)",
            "FadeIn(m, direction=UP)",
            "m.animate(run_time=1)",
        ] {
            assert_eq!(
                run("source_pattern", "render failed", source),
                Some(ErrorCategory::ApiMisuse),
                "{}",
                source
            );
        }
        assert_eq!(run("source_pattern", "render failed", "t = Text('x')"), None);
    }

    #[test]
    fn framework_stage_routes_spatial_words() {
        assert_eq!(
            run("framework_keyword", "Mobject position exceeds frame", ""),
            Some(ErrorCategory::Spatial)
        );
        assert_eq!(
            run("framework_keyword", "VMobject has no points", ""),
            Some(ErrorCategory::ApiMisuse)
        );
        assert_eq!(run("framework_keyword", "object moved", ""), None);
    }

    #[test]
    fn keyword_stages_are_case_insensitive() {
        assert_eq!(
            run("spatial_keyword", "Labels are CROWDED near the axis", ""),
            Some(ErrorCategory::Spatial)
        );
        assert_eq!(
            run("timing_keyword", "Pacing feels RUSHED", ""),
            Some(ErrorCategory::Timing)
        );
    }

    #[test]
    fn structural_stage_checks_updaters_then_edges() {
        assert_eq!(
            run(
                "structural_heuristic",
                "",
                "d.add_updater(f)\nself.play(FadeOut(d))"
            ),
            Some(ErrorCategory::Syntax)
        );
        assert_eq!(
            run(
                "structural_heuristic",
                "",
                "d.add_updater(f)\nd.clear_updaters()\nself.play(FadeOut(d))"
            ),
            None
        );
        assert_eq!(
            run(
                "structural_heuristic",
                "",
                "a.to_edge(DOWN)\nb.to_edge(DOWN)"
            ),
            Some(ErrorCategory::Spatial)
        );
        assert_eq!(
            run(
                "structural_heuristic",
                "",
                "a.to_edge(DOWN)\nb.to_edge(DOWN)\nFadeTransform(a, b)"
            ),
            None
        );
    }

    #[test]
    fn first_matching_stage_wins() {
        let (category, stage) = classify_with_stage(
            "KeyError: 'x' caused overlap",
            "a.to_edge(DOWN)\nb.to_edge(DOWN)",
        );
        assert_eq!(category, ErrorCategory::Syntax);
        assert_eq!(stage, Some("exception_name"));
    }

    #[test]
    fn fallthrough_is_general() {
        assert_eq!(
            classify_with_stage("Unknown error occurred during rendering", "some_random_code()"),
            (ErrorCategory::General, None)
        );
        assert_eq!(classify("", ""), ErrorCategory::General);
    }
}
