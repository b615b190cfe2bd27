//! Confidence scoring and detail extraction for a classified failure.
//!
//! The category comes from [`classify`]; a second, category-specific pass
//! then decides how sure we are and records the sub-pattern that matched.
//! The more specific the match, the higher the confidence.

use super::classify::{
    api_token_re, classify, count_bottom_edge_calls, is_text_setter_misuse, ErrorCategory,
    RUNTIME_ERROR_NAMES,
};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

pub const SYNTAX_CONFIDENCE: f64 = 0.95;
pub const API_EXACT_CONFIDENCE: f64 = 1.0;
/// The source lacks the offending call but the error names the API token.
pub const API_MESSAGE_TOKEN_CONFIDENCE: f64 = 0.9;
pub const API_UNKNOWN_CONFIDENCE: f64 = 0.7;
pub const SPATIAL_REPEATED_EDGE_CONFIDENCE: f64 = 0.9;
pub const SPATIAL_KEYWORD_CONFIDENCE: f64 = 0.85;
pub const SPATIAL_GENERIC_CONFIDENCE: f64 = 0.6;
pub const TIMING_FEW_WAITS_CONFIDENCE: f64 = 0.85;
pub const TIMING_RATIO_CONFIDENCE: f64 = 0.6;
pub const TIMING_EXPLICIT_CONFIDENCE: f64 = 0.75;
pub const TIMING_NO_PLAYS_CONFIDENCE: f64 = 0.5;
pub const GENERAL_CONFIDENCE: f64 = 0.3;

/// Below this many waits per play the scene is considered rushed.
const MIN_WAIT_RATIO: f64 = 0.3;

pub const ISSUE_TEXT_SET_VALUE: &str = "Text.set_value() doesn't exist (use DecimalNumber)";
pub const ISSUE_CREATE_ALIAS: &str = "Create() instead of ShowCreation()";
pub const ISSUE_LATEX: &str = "LaTeX usage (not installed)";
pub const ISSUE_CAMERA: &str = "ManimCE camera API";
pub const ISSUE_UNKNOWN_API: &str = "Unknown API mismatch";
pub const ISSUE_EXPLICIT_OVERLAP: &str = "Explicit overlap detected";
pub const ISSUE_OUT_OF_BOUNDS: &str = "Out of bounds";
pub const ISSUE_POTENTIAL_OVERLAP: &str = "Potential spatial overlap";
pub const ISSUE_TIMING: &str = "Timing issue";
pub const ISSUE_EXPLICIT_TIMING: &str = "Explicit timing issue";
pub const ISSUE_UNCLASSIFIED: &str = "Could not classify";

const OVERLAP_KEYWORDS: [&str; 3] = ["overlap", "same position", "collision"];
const BOUNDS_KEYWORDS: [&str; 3] = ["bounds", "off-screen", "off screen"];
const EXPLICIT_TIMING_KEYWORDS: [&str; 3] = ["too fast", "too slow", "duration mismatch"];

const PLAY_CALL: &str = "self.play(";
const WAIT_CALL: &str = "self.wait(";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntaxDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undefined_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiDetails {
    pub issue: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialDetails {
    pub issue: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralDetails {
    pub issue: String,
}

/// Category-specific findings.
///
/// Serializes to a flat map whose keys (`errorKind`, `undefinedName`,
/// `issue`, `waitRatio`) are present only when the finding was made.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Details {
    Syntax(SyntaxDetails),
    ApiMisuse(ApiDetails),
    Spatial(SpatialDetails),
    Timing(TimingDetails),
    General(GeneralDetails),
}

impl Details {
    pub fn issue(&self) -> Option<&str> {
        match self {
            Details::Syntax(d) => d.issue.as_deref(),
            Details::ApiMisuse(d) => Some(&d.issue),
            Details::Spatial(d) => Some(&d.issue),
            Details::Timing(d) => d.issue.as_deref(),
            Details::General(d) => Some(&d.issue),
        }
    }

    pub fn undefined_name(&self) -> Option<&str> {
        match self {
            Details::Syntax(d) => d.undefined_name.as_deref(),
            _ => None,
        }
    }

    pub fn error_kind(&self) -> Option<&str> {
        match self {
            Details::Syntax(d) => d.error_kind.as_deref(),
            _ => None,
        }
    }

    pub fn wait_ratio(&self) -> Option<f64> {
        match self {
            Details::Timing(d) => d.wait_ratio,
            _ => None,
        }
    }

    /// Names of the keys that are present, in a stable order.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.error_kind().is_some() {
            keys.push("errorKind");
        }
        if self.undefined_name().is_some() {
            keys.push("undefinedName");
        }
        if self.issue().is_some() {
            keys.push("issue");
        }
        if self.wait_ratio().is_some() {
            keys.push("waitRatio");
        }
        keys
    }

    pub fn has(&self, key: &str) -> bool {
        self.keys().contains(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }
}

/// Category, confidence in `[0, 1]` and supporting details.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub category: ErrorCategory,
    pub confidence: f64,
    pub details: Details,
}

fn undefined_name_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"name ['"]([^'"]+)['"] is not defined"#).ok())
        .as_ref()
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Classify a failure and score the verdict.
pub fn classify_with_confidence(message: &str, source: &str) -> ClassificationResult {
    let category = classify(message, source);
    let (confidence, details) = match category {
        ErrorCategory::Syntax => score_syntax(message),
        ErrorCategory::ApiMisuse => score_api(message, source),
        ErrorCategory::Spatial => score_spatial(message, source),
        ErrorCategory::Timing => score_timing(message, source),
        ErrorCategory::General => (
            GENERAL_CONFIDENCE,
            Details::General(GeneralDetails {
                issue: ISSUE_UNCLASSIFIED.to_string(),
            }),
        ),
    };

    ClassificationResult {
        category,
        confidence,
        details,
    }
}

fn score_syntax(message: &str) -> (f64, Details) {
    let error_kind = RUNTIME_ERROR_NAMES
        .iter()
        .find(|name| message.contains(*name))
        .map(|name| name.to_string());

    let undefined_name = undefined_name_re()
        .and_then(|re| re.captures(message))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    let issue = (message.contains("AttributeError") && is_text_setter_misuse(message))
        .then(|| ISSUE_TEXT_SET_VALUE.to_string());

    (
        SYNTAX_CONFIDENCE,
        Details::Syntax(SyntaxDetails {
            error_kind,
            undefined_name,
            issue,
        }),
    )
}

/// Issue named by an API token in the error message itself.
fn message_api_issue(message: &str) -> Option<&'static str> {
    let token = api_token_re()?.find(message)?.as_str();
    Some(match token {
        "Create" => ISSUE_CREATE_ALIAS,
        "camera.frame" => ISSUE_CAMERA,
        _ => ISSUE_LATEX,
    })
}

fn score_api(message: &str, source: &str) -> (f64, Details) {
    let (confidence, issue) = if source.contains("Create(") {
        (API_EXACT_CONFIDENCE, ISSUE_CREATE_ALIAS)
    } else if source.contains("MathTex") || source.contains("TexText") || source.contains("Tex(")
    {
        (API_EXACT_CONFIDENCE, ISSUE_LATEX)
    } else if source.contains("self.camera.frame") {
        (API_EXACT_CONFIDENCE, ISSUE_CAMERA)
    } else if let Some(issue) = message_api_issue(message) {
        (API_MESSAGE_TOKEN_CONFIDENCE, issue)
    } else {
        (API_UNKNOWN_CONFIDENCE, ISSUE_UNKNOWN_API)
    };

    (
        confidence,
        Details::ApiMisuse(ApiDetails {
            issue: issue.to_string(),
        }),
    )
}

fn score_spatial(message: &str, source: &str) -> (f64, Details) {
    let lower = message.to_lowercase();
    let edge_count = count_bottom_edge_calls(source);

    let (confidence, issue) = if edge_count > 1 {
        (
            SPATIAL_REPEATED_EDGE_CONFIDENCE,
            format!("Multiple text at same edge ({})", edge_count),
        )
    } else if contains_any(&lower, &OVERLAP_KEYWORDS) {
        (SPATIAL_KEYWORD_CONFIDENCE, ISSUE_EXPLICIT_OVERLAP.to_string())
    } else if contains_any(&lower, &BOUNDS_KEYWORDS) {
        (SPATIAL_KEYWORD_CONFIDENCE, ISSUE_OUT_OF_BOUNDS.to_string())
    } else {
        (SPATIAL_GENERIC_CONFIDENCE, ISSUE_POTENTIAL_OVERLAP.to_string())
    };

    (confidence, Details::Spatial(SpatialDetails { issue }))
}

fn score_timing(message: &str, source: &str) -> (f64, Details) {
    let waits = source.matches(WAIT_CALL).count();
    let plays = source.matches(PLAY_CALL).count();

    let mut details = TimingDetails::default();
    let mut confidence = TIMING_NO_PLAYS_CONFIDENCE;
    let mut too_few_waits = false;

    if plays > 0 {
        let ratio = waits as f64 / plays as f64;
        details.wait_ratio = Some(ratio);
        if ratio < MIN_WAIT_RATIO {
            too_few_waits = true;
            details.issue = Some(format!("Too few waits ({}/{} plays)", waits, plays));
            confidence = TIMING_FEW_WAITS_CONFIDENCE;
        } else {
            details.issue = Some(ISSUE_TIMING.to_string());
            confidence = TIMING_RATIO_CONFIDENCE;
        }
    }

    // Message-level evidence sets the confidence even when the ratio scored higher.
    if contains_any(&message.to_lowercase(), &EXPLICIT_TIMING_KEYWORDS) {
        confidence = TIMING_EXPLICIT_CONFIDENCE;
        if !too_few_waits {
            details.issue = Some(ISSUE_EXPLICIT_TIMING.to_string());
        }
    }

    (confidence, Details::Timing(details))
}
