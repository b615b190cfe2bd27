const APPROVED: &str = "APPROVED";

/// Strip markdown code fences from a response.
///
/// Text without fences comes back unchanged.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let has_open = trimmed.starts_with("```");
    let has_close = trimmed.len() >= 3 && trimmed.ends_with("```");
    if !has_open && !has_close {
        return text.to_string();
    }

    let clean = trimmed
        .strip_prefix("```python")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let clean = clean.strip_suffix("```").unwrap_or(clean);
    clean.trim().to_string()
}

/// Checker decision on a piece of generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckVerdict {
    Approved,
    Rejected { feedback: String },
}

impl CheckVerdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, CheckVerdict::Approved)
    }
}

pub fn parse_check_verdict(response: &str) -> CheckVerdict {
    let trimmed = response.trim();
    if trimmed.starts_with(APPROVED) {
        CheckVerdict::Approved
    } else {
        CheckVerdict::Rejected {
            feedback: trimmed.to_string(),
        }
    }
}
