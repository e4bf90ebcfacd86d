//! ResponseGenerator trait definition.

use parley_types::error::GenerationError;

/// Produces the AI reply for a user prompt.
///
/// Implementations live in parley-infra (e.g., `GeminiGenerator`).
pub trait ResponseGenerator: Send + Sync {
    /// Human-readable backend name (e.g., "gemini", "canned").
    fn name(&self) -> &str;

    /// Generate reply text for `prompt`.
    fn generate(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, GenerationError>> + Send;
}
