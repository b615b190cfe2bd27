//! Remediation routing.

use super::classify::ErrorCategory;
use super::confidence::Details;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classifications below this confidence always take the generic route.
pub const MIN_STRATEGY_CONFIDENCE: f64 = 0.5;

/// How the next regeneration should attack the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixStrategy {
    VariableFix,
    SyntaxFix,
    LatexReplacement,
    ApiFix,
    FadetransformFix,
    SpatialFix,
    AddWaits,
    TimingFix,
    GeneralRetry,
}

impl FixStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixStrategy::VariableFix => "variable_fix",
            FixStrategy::SyntaxFix => "syntax_fix",
            FixStrategy::LatexReplacement => "latex_replacement",
            FixStrategy::ApiFix => "api_fix",
            FixStrategy::FadetransformFix => "fadetransform_fix",
            FixStrategy::SpatialFix => "spatial_fix",
            FixStrategy::AddWaits => "add_waits",
            FixStrategy::TimingFix => "timing_fix",
            FixStrategy::GeneralRetry => "general_retry",
        }
    }

    /// Category whose specialised fixer handles this strategy, if any.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            FixStrategy::VariableFix | FixStrategy::SyntaxFix => Some(ErrorCategory::Syntax),
            FixStrategy::LatexReplacement | FixStrategy::ApiFix => Some(ErrorCategory::ApiMisuse),
            FixStrategy::FadetransformFix | FixStrategy::SpatialFix => Some(ErrorCategory::Spatial),
            FixStrategy::AddWaits | FixStrategy::TimingFix => Some(ErrorCategory::Timing),
            FixStrategy::GeneralRetry => None,
        }
    }
}

impl fmt::Display for FixStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn issue_mentions(details: &Details, needle: &str) -> bool {
    details.issue().map(|i| i.contains(needle)).unwrap_or(false)
}

/// Pick a strategy from a scored classification.
pub fn select_strategy(category: ErrorCategory, confidence: f64, details: &Details) -> FixStrategy {
    if confidence.is_nan() || confidence < MIN_STRATEGY_CONFIDENCE {
        return FixStrategy::GeneralRetry;
    }

    match category {
        ErrorCategory::Syntax => {
            if details.has("undefinedName") {
                FixStrategy::VariableFix
            } else {
                FixStrategy::SyntaxFix
            }
        }
        ErrorCategory::ApiMisuse => {
            if issue_mentions(details, "LaTeX") {
                FixStrategy::LatexReplacement
            } else {
                FixStrategy::ApiFix
            }
        }
        ErrorCategory::Spatial => {
            if issue_mentions(details, "Multiple text") {
                FixStrategy::FadetransformFix
            } else {
                FixStrategy::SpatialFix
            }
        }
        ErrorCategory::Timing => {
            if issue_mentions(details, "Too few waits") {
                FixStrategy::AddWaits
            } else {
                FixStrategy::TimingFix
            }
        }
        ErrorCategory::General => FixStrategy::GeneralRetry,
    }
}
