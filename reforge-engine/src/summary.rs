//! # Context Summarizer
//!
//! Condenses growing conversation history into a short digest so the prompt
//! stays bounded. Two strategies: a secondary model call, or a cheap
//! recency-window join that needs no backend at all.

use crate::provider::{ChatMessage, CompletionRequest, LlmProvider, Role};

const SUMMARY_INSTRUCTION: &str = "Summarize the following conversation, focusing on the \
    user's goal, the code attempts, and any errors encountered. Be extremely concise.";

/// How the conversation digest is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMode {
    /// Secondary backend call with conservative generation parameters
    Model,
    /// Join the last N user and assistant entries; no backend involved
    Recency { max_entries: usize },
}

/// Produce a digest of the history.
///
/// Never fails: a backend error during model summarization degrades to a
/// placeholder digest so the refinement loop keeps going.
pub async fn summarize_history<P: LlmProvider>(
    provider: &P,
    mode: SummaryMode,
    history: &[ChatMessage],
) -> String {
    if history.is_empty() {
        return "No conversation history yet.".to_string();
    }

    match mode {
        SummaryMode::Recency { max_entries } => recency_digest(history, max_entries),
        SummaryMode::Model => {
            let mut messages = vec![ChatMessage::system(SUMMARY_INSTRUCTION)];
            messages.extend_from_slice(history);

            let request = CompletionRequest::new(messages)
                .with_temperature(0.2)
                .with_max_tokens(500)
                .with_top_p(0.5);

            match provider.complete(request).await {
                Ok(response) => match response.content {
                    Some(text) => text.trim().to_string(),
                    None => "Error summarizing conversation.".to_string(),
                },
                Err(_) => "Error summarizing conversation.".to_string(),
            }
        }
    }
}

fn recency_digest(history: &[ChatMessage], max_entries: usize) -> String {
    let recent = |role: Role| -> String {
        let entries: Vec<&str> = history
            .iter()
            .filter(|m| m.role == role)
            .map(|m| m.content.as_str())
            .collect();
        let start = entries.len().saturating_sub(max_entries);
        entries[start..].join(" | ")
    };

    format!(
        "User queries: {}\nAI responses: {}",
        recent(Role::User),
        recent(Role::Assistant)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        CompletionResponse, FinishReason, ProviderError, StreamChunk, StreamReceiver, Usage,
    };
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    }

    impl Scripted {
        fn with(replies: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
            }
        }
    }

    impl LlmProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn models(&self) -> Vec<String> {
            vec!["scripted".into()]
        }

        fn default_model(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Other("script exhausted".into())));
            reply.map(|content| CompletionResponse {
                id: "scripted".into(),
                model: "scripted".into(),
                content: Some(content),
                finish_reason: FinishReason::Stop,
                usage: Usage::default(),
            })
        }

        async fn stream(
            &self,
            request: CompletionRequest,
        ) -> Result<StreamReceiver, ProviderError> {
            let response = self.complete(request).await?;
            let text = response.content.unwrap_or_default();
            let stream = async_stream::stream! {
                yield StreamChunk::Text(text);
                yield StreamChunk::Done { finish_reason: FinishReason::Stop, usage: None };
            };
            Ok(StreamReceiver::new(stream))
        }
    }

    fn history() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("write a prime sieve"),
            ChatMessage::assistant("here is attempt one"),
            ChatMessage::user("it misses 2"),
            ChatMessage::assistant("fixed version"),
        ]
    }

    #[tokio::test]
    async fn test_empty_history_placeholder() {
        let provider = Scripted::with(vec![]);
        let digest = summarize_history(&provider, SummaryMode::Model, &[]).await;
        assert_eq!(digest, "No conversation history yet.");
    }

    #[tokio::test]
    async fn test_model_mode_uses_backend() {
        let provider = Scripted::with(vec![Ok("  user wants a sieve  ".to_string())]);
        let digest = summarize_history(&provider, SummaryMode::Model, &history()).await;
        assert_eq!(digest, "user wants a sieve");
    }

    #[tokio::test]
    async fn test_model_mode_degrades_on_backend_error() {
        let provider = Scripted::with(vec![Err(ProviderError::Network("down".into()))]);
        let digest = summarize_history(&provider, SummaryMode::Model, &history()).await;
        assert_eq!(digest, "Error summarizing conversation.");
    }

    #[tokio::test]
    async fn test_recency_mode_joins_last_entries() {
        let provider = Scripted::with(vec![]);
        let digest = summarize_history(
            &provider,
            SummaryMode::Recency { max_entries: 1 },
            &history(),
        )
        .await;
        assert_eq!(digest, "User queries: it misses 2\nAI responses: fixed version");
    }

    #[tokio::test]
    async fn test_recency_mode_keeps_window() {
        let provider = Scripted::with(vec![]);
        let digest = summarize_history(
            &provider,
            SummaryMode::Recency { max_entries: 5 },
            &history(),
        )
        .await;
        assert!(digest.contains("write a prime sieve | it misses 2"));
        assert!(digest.contains("here is attempt one | fixed version"));
    }
}
