//! OpenAI Chat Completions compatible adapter.
//!
//! Covers OpenAI itself and the many gateways that mirror its `/chat/completions` and
//! `/models` routes with `Authorization: Bearer` auth.

mod adapter;
mod request;
mod response;
mod stream;
mod types;

pub use adapter::OpenAiAdapter;
