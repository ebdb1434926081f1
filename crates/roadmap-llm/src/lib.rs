//! LLM access for roadmap generation and repair.
//!
//! The rest of the workspace treats text generation as an opaque capability:
//! a prompt goes in, text comes out. This crate provides that capability.
//!
//! - **provider**: `LlmProvider` trait with Anthropic and OpenAI-compatible implementations
//! - **text**: cleanup of raw completions before structured parsing

pub mod provider;
pub mod text;

pub use provider::{
    LlmProvider, LlmResponse, ProviderError, available_providers, create_provider,
    provider_from_env,
};
pub use text::strip_think_blocks;
