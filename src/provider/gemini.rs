//! Google Gemini `generateContent` compatible adapter.
//!
//! The credential travels as the `key` query parameter, so request URLs are secrets and
//! only their path is ever logged.

mod adapter;
mod request;
mod response;
mod stream;
mod types;

pub use adapter::GeminiAdapter;
