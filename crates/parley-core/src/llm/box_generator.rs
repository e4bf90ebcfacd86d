//! BoxResponseGenerator -- object-safe dynamic dispatch wrapper for ResponseGenerator.
//!
//! 1. Define an object-safe `ResponseGeneratorDyn` trait with boxed futures
//! 2. Blanket-impl `ResponseGeneratorDyn` for all `T: ResponseGenerator`
//! 3. `BoxResponseGenerator` wraps `Box<dyn ResponseGeneratorDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use parley_types::error::GenerationError;

use super::generator::ResponseGenerator;

/// Object-safe version of [`ResponseGenerator`] with boxed futures.
pub trait ResponseGeneratorDyn: Send + Sync {
    fn name_dyn(&self) -> &str;

    fn generate_boxed<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>>;
}

impl<T: ResponseGenerator> ResponseGeneratorDyn for T {
    fn name_dyn(&self) -> &str {
        ResponseGenerator::name(self)
    }

    fn generate_boxed<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>> {
        Box::pin(self.generate(prompt))
    }
}

/// Type-erased response generator for runtime backend selection.
///
/// Since `ResponseGenerator` uses RPITIT, it cannot be used as a trait object
/// directly. `BoxResponseGenerator` implements the trait itself by delegating
/// to the inner `ResponseGeneratorDyn` object, so the sync engine can be
/// pinned to one concrete generator type while the backend is picked from
/// configuration.
pub struct BoxResponseGenerator {
    inner: Box<dyn ResponseGeneratorDyn + Send + Sync>,
}

impl BoxResponseGenerator {
    /// Wrap a concrete `ResponseGenerator` in a type-erased box.
    pub fn new<T: ResponseGenerator + 'static>(generator: T) -> Self {
        Self {
            inner: Box::new(generator),
        }
    }
}

impl ResponseGenerator for BoxResponseGenerator {
    fn name(&self) -> &str {
        self.inner.name_dyn()
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.inner.generate_boxed(prompt).await
    }
}
