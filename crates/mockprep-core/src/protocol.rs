use crate::error::ProviderError;
use std::future::Future;
use std::pin::Pin;

pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + 'a>>;

/// A generative-text backend: prompt in, raw completion text out.
///
/// Implementations own transport concerns (timeouts, retries, auth). The
/// returned text is untrusted and goes through reconciliation before use.
pub trait CompletionProvider: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    fn generate<'a>(&'a self, prompt: &'a str) -> CompletionFuture<'a>;
}
