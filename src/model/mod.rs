mod adapter;
mod registry;
mod types;

pub use adapter::{ChatAdapter, MAX_TOKENS_LIMIT};
pub use registry::ModelRegistry;
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, ChatRole, GenerateRequest, GenerateResponse, ModelInfo,
};
