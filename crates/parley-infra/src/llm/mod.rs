//! Response generator implementations.
//!
//! - [`gemini::GeminiGenerator`]: Google Generative Language `generateContent` API.
//! - [`canned::CannedGenerator`]: rotating demo replies, no network.

pub mod canned;
pub mod gemini;
