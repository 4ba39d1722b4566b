use tracing::{info, warn};

use kag_core::config::{GenerationSettings, LlmSettings};
use kag_core::traits::{ChatRequest, LanguageModel};

/// Returned in place of a generated answer when the model call fails.
pub const FALLBACK_ANSWER: &str =
    "I apologize, but I was unable to generate a response at this time. The search results below are still available.";

const QUERY_PLACEHOLDER: &str = "{query}";
const CONTEXT_PLACEHOLDER: &str = "{context}";

pub struct AnswerGenerator<L: LanguageModel> {
    model: L,
    system_prompt: String,
    prompt_template: String,
    max_tokens: u32,
    temperature: f32,
}

impl<L: LanguageModel> AnswerGenerator<L> {
    pub fn new(model: L, generation: &GenerationSettings, llm: &LlmSettings) -> Self {
        Self {
            model,
            system_prompt: generation.system_prompt.clone(),
            prompt_template: generation.prompt_template.clone(),
            max_tokens: llm.max_tokens,
            temperature: llm.temperature,
        }
    }

    /// Fills `{query}` and `{context}` in one pass over the template, so
    /// placeholder text inside either value is left as is.
    pub fn render_prompt(&self, query: &str, context: &str) -> String {
        let mut out = String::with_capacity(self.prompt_template.len() + query.len() + context.len());
        let mut rest = self.prompt_template.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            if let Some(after) = tail.strip_prefix(QUERY_PLACEHOLDER) {
                out.push_str(query);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(CONTEXT_PLACEHOLDER) {
                out.push_str(context);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }

    /// Never fails: model errors and empty completions yield [`FALLBACK_ANSWER`].
    pub async fn generate(&self, query: &str, context: &str) -> String {
        let request = ChatRequest {
            system: self.system_prompt.clone(),
            user: self.render_prompt(query, context),
            max_tokens: Some(self.max_tokens),
            temperature: self.temperature,
        };
        match self.model.complete(&request).await {
            Ok(answer) if !answer.trim().is_empty() => {
                info!(model = self.model.model(), chars = answer.len(), "generated answer");
                answer
            }
            Ok(_) => {
                warn!(model = self.model.model(), "model returned an empty answer");
                FALLBACK_ANSWER.to_string()
            }
            Err(e) => {
                warn!(model = self.model.model(), error = %e, "answer generation failed");
                FALLBACK_ANSWER.to_string()
            }
        }
    }
}
