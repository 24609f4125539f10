pub mod auth;
pub mod config;
pub mod error;
pub mod model;
pub mod server;
pub mod upstream;

pub use config::AppConfig;
pub use error::ServiceError;
pub use model::{ChatAdapter, ChatRequest, ChatResponse, GenerateRequest, GenerateResponse};
pub use server::build_router;
pub use upstream::{CompletionBackend, FoundryClient};
