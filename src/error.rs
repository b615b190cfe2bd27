pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("topic description is empty")]
    EmptyDescription,

    #[error("no API key: set XAI_API_KEY or api_key in {0}")]
    MissingApiKey(String),

    #[error("generation failed ({purpose}): {message}")]
    Generation { purpose: String, message: String },

    #[error("artifact error: {0}")]
    Io(String),
}

impl PipelineError {
    pub fn generation(purpose: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generation {
            purpose: purpose.into(),
            message: message.into(),
        }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }
}
