//! LLM module - OpenRouter chat completions
//!
//! Backs the text expander and relationship classifier in `memory`.

pub mod client;
pub mod types;

pub use client::OpenRouterClient;
pub use types::{GenerationOptions, Message, Role};
