//! Query Rewriter - Turns follow-ups into standalone questions

use super::session::Turn;
use crate::completion::CompletionProvider;
use crate::errors::Result;
use std::sync::Arc;

/// System instruction for the rewriting call
pub const REWRITE_INSTRUCTION: &str = "You are a query rewriting expert. Based on the provided chat history, \
rephrase the \"Follow Up user Question\" into a complete, standalone question that can be understood \
without the chat history.\nOnly output the rewritten question and nothing else.";

/// Rewrites a question against the session's prior turns
pub struct QueryRewriter {
    completion: Arc<dyn CompletionProvider>,
}

impl QueryRewriter {
    pub fn new(completion: Arc<dyn CompletionProvider>) -> Self {
        Self { completion }
    }

    /// Produce a standalone query for `question`
    ///
    /// The question is sent as a trailing user turn of this request only;
    /// `history` is borrowed and never modified.
    pub async fn rewrite(&self, question: &str, history: &[Turn]) -> Result<String> {
        let mut turns = Vec::with_capacity(history.len() + 1);
        turns.extend_from_slice(history);
        turns.push(Turn::user(question));

        let rewritten = self.completion.generate(&turns, REWRITE_INSTRUCTION).await?;
        let rewritten = rewritten.trim();

        if rewritten.is_empty() {
            tracing::warn!(question = %question, "Rewrite came back empty, using the original question");
            return Ok(question.to_string());
        }

        tracing::debug!(question = %question, rewritten = %rewritten, "Query rewritten");
        Ok(rewritten.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the last request and replies with a fixed string
    struct Scripted {
        reply: Result<String>,
        seen: Mutex<Option<(Vec<Turn>, String)>>,
    }

    impl Scripted {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for Scripted {
        async fn generate(&self, turns: &[Turn], system_instruction: &str) -> Result<String> {
            *self.seen.lock().unwrap() = Some((turns.to_vec(), system_instruction.to_string()));
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(AppError::Completion {
                    message: e.to_string(),
                }),
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn test_rewrite_sends_history_plus_question() {
        let model = Arc::new(Scripted::replying("  What is the time complexity of queue operations?\n"));
        let rewriter = QueryRewriter::new(model.clone());
        let history = vec![Turn::user("What is a queue?"), Turn::model("A FIFO structure.")];

        let out = rewriter.rewrite("How fast is it?", &history).await.unwrap();
        assert_eq!(out, "What is the time complexity of queue operations?");

        let (turns, instruction) = model.seen.lock().unwrap().clone().unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2], Turn::user("How fast is it?"));
        assert_eq!(instruction, REWRITE_INSTRUCTION);
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_history_is_not_special_cased() {
        let model = Arc::new(Scripted::replying("What is a heap?"));
        let rewriter = QueryRewriter::new(model.clone());

        rewriter.rewrite("what's a heap", &[]).await.unwrap();
        let (turns, _) = model.seen.lock().unwrap().clone().unwrap();
        assert_eq!(turns, vec![Turn::user("what's a heap")]);
    }

    #[tokio::test]
    async fn test_blank_rewrite_falls_back_to_question() {
        let rewriter = QueryRewriter::new(Arc::new(Scripted::replying("   ")));
        let out = rewriter.rewrite("What is a trie?", &[]).await.unwrap();
        assert_eq!(out, "What is a trie?");
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let model = Scripted {
            reply: Err(AppError::Completion {
                message: "quota".into(),
            }),
            seen: Mutex::new(None),
        };
        let rewriter = QueryRewriter::new(Arc::new(model));
        let err = rewriter.rewrite("q", &[]).await.unwrap_err();
        assert!(err.is_upstream());
    }
}
