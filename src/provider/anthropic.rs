//! Anthropic Messages compatible adapter.
//!
//! Authenticates with `x-api-key` and pins `anthropic-version`; system turns travel in
//! the top-level `system` field rather than in `messages`.

mod adapter;
mod request;
mod response;
mod stream;
mod types;

pub use adapter::AnthropicAdapter;
