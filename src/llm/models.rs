use serde::{Deserialize, Serialize};

/// Token budget for planning calls.
pub const PLAN_MAX_TOKENS: u32 = 4000;
/// Token budget for checker calls.
pub const CHECK_MAX_TOKENS: u32 = 4000;
/// Token budget for one act of a multi-pass scene.
pub const ACT_MAX_TOKENS: u32 = 8000;
/// Token budget for whole-scene code and fixes.
pub const CODE_MAX_TOKENS: u32 = 16000;

/// API usage information reported by the chat endpoint
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// Response from LLM including content and usage stats
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub content: String,
    pub usage: Option<Usage>,
    pub model: String,
}

impl LlmResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// One system+user exchange with the generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    /// Tag recorded in metrics, e.g. `plan`, `code_act2`, `fix_syntax_variable_fix`
    pub purpose: String,
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn new(
        system: impl Into<String>,
        user: impl Into<String>,
        purpose: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            purpose: purpose.into(),
            max_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_deserialize_partial() {
        let json = r#"{"prompt_tokens": 100, "completion_tokens": 50}"#;
        let usage: Usage = serde_json::from_str(json).unwrap();
        assert_eq!(usage.prompt_tokens, 100);
        assert_eq!(usage.completion_tokens, 50);
        assert_eq!(usage.total_tokens, 0);
    }

    #[test]
    fn test_request_builder() {
        let req = GenerationRequest::new("sys", "user", "plan", PLAN_MAX_TOKENS);
        assert_eq!(req.purpose, "plan");
        assert_eq!(req.max_tokens, 4000);
    }
}
