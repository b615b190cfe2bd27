//! Renderer failure diagnosis
//!
//! Turns a failed render (error text plus the script that produced it) into
//! a category, a confidence, structured context and a fix strategy. Every
//! input resolves to a diagnosis; nothing in here returns an error.

pub mod classify;
pub mod confidence;
pub mod context;
pub mod strategy;


pub use classify::{classify, classify_with_stage, ErrorCategory};
pub use confidence::{classify_with_confidence, ClassificationResult, Details};
pub use context::{extract_context, ErrorContext};
pub use strategy::{select_strategy, FixStrategy};

use serde::Serialize;

/// Everything the fix loop needs to know about one failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    pub classification: ClassificationResult,
    pub context: ErrorContext,
    pub strategy: FixStrategy,
    /// Classification stage that produced the verdict (`None` for the fallback)
    pub stage: Option<&'static str>,
}

impl Diagnosis {
    pub fn category(&self) -> ErrorCategory {
        self.classification.category
    }

    pub fn confidence(&self) -> f64 {
        self.classification.confidence
    }

    pub fn details(&self) -> &Details {
        &self.classification.details
    }
}

/// Run extraction, classification, scoring and strategy selection.
pub fn diagnose(message: &str, source: &str) -> Diagnosis {
    let classification = classify_with_confidence(message, source);
    let (_, stage) = classify_with_stage(message, source);
    let strategy = select_strategy(
        classification.category,
        classification.confidence,
        &classification.details,
    );

    Diagnosis {
        context: extract_context(message, source),
        strategy,
        stage,
        classification,
    }
}
