pub mod client;
pub mod models;
pub mod parse;
pub mod prompts;

pub use client::ChatClient;
pub use models::{GenerationRequest, LlmResponse, Usage};
pub use parse::{parse_check_verdict, strip_code_fences, CheckVerdict};
pub use prompts::PromptLibrary;

/// Text generation: a system and user prompt in, completion text out.
#[allow(async_fn_in_trait)]
pub trait GenerationService {
    async fn generate(&self, request: GenerationRequest) -> anyhow::Result<LlmResponse>;
}
