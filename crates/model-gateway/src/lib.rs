//! `model-gateway` — typed chat boundary to the language-model backend.
//!
//! The orchestration core treats the model as a black box: an ordered list of
//! `{role, content}` messages goes in, one opaque string comes out. This crate
//! owns that boundary. Whatever shape the backend returns (a bare string, a
//! structured content array), it is normalized into a single `String` here so
//! no downstream code ever inspects provider-specific response layouts.
//!
//! ```text
//! Vec<ChatMessage>
//!     │
//!     ▼
//! HttpGateway   ← POSTs an OpenAI-style chat-completions body
//!     │            enforces a hard per-request timeout
//!     ▼
//! String        ← first choice's message content, flattened
//! ```
//!
//! The [`ChatBackend`] trait is the seam the core consumes; tests inject a
//! [`scripted::ScriptedBackend`] instead of a live HTTP client.

pub mod client;
pub mod error;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod scripted;

pub use client::{GatewayConfig, HttpGateway};
pub use error::GatewayError;
pub use types::{ChatMessage, Role};

use async_trait::async_trait;

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// The chat collaborator contract: one ordered message list in, one opaque
/// text response out. No streaming, no function calling.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;
}
