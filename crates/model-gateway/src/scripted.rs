//! Scripted chat backend for tests: replies are queued up front, every call
//! pops the next one, and the full message history is recorded for
//! assertions. No network, no model.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{ChatBackend, ChatMessage, GatewayError, Result};

#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<Vec<String>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedBackend {
    /// Queue replies in the order they should be returned.
    pub fn new(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Number of chat calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Message lists from every call, in order.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    /// The user-message content of call `idx` (panics if absent).
    pub fn user_prompt(&self, idx: usize) -> String {
        self.calls.lock().unwrap()[idx]
            .iter()
            .find(|m| m.role == crate::Role::User)
            .map(|m| m.content.clone())
            .expect("call has no user message")
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let call_index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(messages.to_vec());
            calls.len()
        };

        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Err(GatewayError::ScriptExhausted(call_index));
        }
        Ok(replies.remove(0))
    }
}
