//! Generative backend capability trait.
//!
//! A [`Generator`] turns a single prompt into text. It is optional: the
//! answer path in [`crate::retrieve`] works without one and falls back to
//! extractive snippets. Calls may fail (network, quota); callers must
//! treat that as recoverable.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable backend label, e.g. `"gemini:gemini-1.5-flash"`.
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}
