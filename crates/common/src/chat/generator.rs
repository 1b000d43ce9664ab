//! Answer Generator - Context-grounded completion with history commit

use super::session::{SessionGuard, Turn};
use crate::completion::CompletionProvider;
use crate::errors::Result;
use std::sync::Arc;

/// Sentence the model must give when the context lacks the answer
pub const FALLBACK_ANSWER: &str = "I could not find the answer in the provided document.";

/// Marker introducing the retrieved context inside the system instruction
pub const CONTEXT_HEADER: &str = "Context:";

/// Grounding instruction; the assembled context is appended after [`CONTEXT_HEADER`]
pub const ANSWER_INSTRUCTION: &str = "You are a Data Structure and Algorithm Expert.
You will be given a context of relevant information and a user question.
Your task is to answer the user's question based ONLY on the provided context.
If the answer is not in the context, you must say \"I could not find the answer in the provided document.\"
Keep your answers clear, concise, and educational.

IMPORTANT: When providing code or algorithms, ALWAYS format them using markdown code blocks:
- Use triple backticks (```) to wrap code blocks
- Use single backticks (`) for inline code
- Example: ```\nalgorithm Example()\n  // code here\nend```";

/// Produces the final answer and records the exchange
pub struct AnswerGenerator {
    completion: Arc<dyn CompletionProvider>,
}

impl AnswerGenerator {
    pub fn new(completion: Arc<dyn CompletionProvider>) -> Self {
        Self { completion }
    }

    /// Full system instruction for a given context block
    pub fn system_instruction(context: &str) -> String {
        format!("{}\n\n{} {}", ANSWER_INSTRUCTION, CONTEXT_HEADER, context)
    }

    /// Answer `query` from `context`, committing the exchange to `session` on success
    ///
    /// The persisted history grows by exactly one user and one model turn,
    /// or not at all when the completion call fails.
    pub async fn generate(
        &self,
        query: &str,
        context: &str,
        session: &mut SessionGuard,
    ) -> Result<String> {
        let question = Turn::user(query);

        let mut turns = Vec::with_capacity(session.history().len() + 1);
        turns.extend_from_slice(session.history());
        turns.push(question.clone());

        let answer = self
            .completion
            .generate(&turns, &Self::system_instruction(context))
            .await?;

        session.commit_exchange(question, Turn::model(answer.clone()));
        Ok(answer)
    }
}
