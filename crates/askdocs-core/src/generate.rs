//! Generator trait and the offline echo generator.

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::prompt::document_section;

/// Sends a composed prompt to a language model.
///
/// One request, one response. Implementations never retry and never
/// encode failures in the returned text; every failure is a
/// [`GenerationError`].
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Answers with the prompt's document section, verbatim.
///
/// Useful offline and in tests: the answer contains exactly the retrieved
/// context, and an empty context produces an empty answer.
#[derive(Debug, Clone, Default)]
pub struct EchoGenerator;

#[async_trait]
impl Generator for EchoGenerator {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        document_section(prompt)
            .map(str::to_string)
            .ok_or_else(|| GenerationError::Malformed("prompt has no document section".into()))
    }
}
