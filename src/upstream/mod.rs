mod client;
mod wire;

pub use client::{CompletionBackend, FoundryClient};
pub use wire::{Completion, CompletionChoice, CompletionMessage, CompletionPayload, CompletionUsage};
