//! OpenAI-compatible completion client used to evaluate moderation prompts.
mod openai;
mod retry;
mod types;

pub use openai::{OpenAiAuthScheme, OpenAiClient, OpenAiConfig, DEFAULT_GITHUB_MODELS_API_BASE};
pub use types::{
    ChatRequest, ChatResponse, ChatUsage, LlmClient, Message, MessageRole, TauAiError,
};
