//! Offline generator that cycles through fixed demo replies.

use std::sync::atomic::{AtomicUsize, Ordering};

use parley_core::llm::generator::ResponseGenerator;
use parley_types::error::GenerationError;

const REPLIES: &[&str] = &[
    "I'm thinking about that, give me a moment...",
    "That's an interesting question!",
    "I don't have all the answers, but here's what I think.",
    "Let me search my knowledge base for that...",
    "Have you considered looking at the problem from a different angle?",
    "That's a great point! Here's another perspective to consider.",
    "I'm not entirely sure, but my best guess would be...",
    "According to my training, the answer might be...",
    "I'm learning too, and that's a fascinating topic!",
    "Let me help you think through this problem.",
];

/// Returns the next demo reply on each call, ignoring the prompt.
#[derive(Debug, Default)]
pub struct CannedGenerator {
    next: AtomicUsize,
}

impl CannedGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResponseGenerator for CannedGenerator {
    fn name(&self) -> &str {
        "canned"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % REPLIES.len();
        Ok(REPLIES[index].to_string())
    }
}
