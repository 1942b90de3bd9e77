//! History compaction for long conversations.
//!
//! The [`HistoryCompactor`] folds everything but the most recent turns into a
//! single summary turn produced by a secondary model. Failures degrade in two
//! steps: a withheld or empty summary still yields a summary turn carrying
//! the error text; a failed summarization call drops the summary and keeps
//! only the newest raw turns.

use vulnscope_llm::{CompletionRequest, Message, SharedBackend};

use crate::types::ChatMessage;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Compaction triggers above this many turns.
pub const DEFAULT_THRESHOLD: usize = 10;

/// Turns kept verbatim after a summary.
pub const DEFAULT_PRESERVE_RECENT: usize = 4;

/// Turns kept when the summarization call fails.
pub const DEFAULT_FALLBACK_WINDOW: usize = 10;

/// Default summarization model.
pub const DEFAULT_SUMMARY_MODEL: &str = "gemini-2.5-flash-lite";

const SUMMARY_MAX_TOKENS: u32 = 2048;

/// Instruction appended after the turns being summarized.
pub const SUMMARY_INSTRUCTION: &str = "Please provide a concise, one-paragraph summary of our \
conversation so far, focusing on key data points, markets, and unresolved questions. Start with \
'Summary of previous conversation:'";

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for history compaction.
#[derive(Debug, Clone)]
pub struct CompactorConfig {
    /// Model used for summaries.
    pub model: String,
    /// Compact when the history has more turns than this.
    pub threshold: usize,
    /// Turns kept verbatim after the summary.
    pub preserve_recent: usize,
    /// Turns kept when summarization fails outright.
    pub fallback_window: usize,
}

impl Default for CompactorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_SUMMARY_MODEL.to_string(),
            threshold: DEFAULT_THRESHOLD,
            preserve_recent: DEFAULT_PRESERVE_RECENT,
            fallback_window: DEFAULT_FALLBACK_WINDOW,
        }
    }
}

/// How a history was prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// Short enough; passed through.
    Untouched,
    /// Older turns replaced by a summary turn.
    Summarized,
    /// Summarization call failed; newest turns kept without a summary.
    Truncated,
}

/// A prepared history: optional summary turn plus retained raw turns.
#[derive(Debug, Clone)]
pub struct CompactedHistory {
    /// Text of the summary turn, already wrapped in `<system_summary>` tags.
    pub summary: Option<String>,
    /// Raw turns kept in order.
    pub retained: Vec<ChatMessage>,
    pub outcome: CompactionOutcome,
}

impl CompactedHistory {
    /// Engine messages: summary turn (as a user turn) then retained turns.
    pub fn to_messages(&self) -> Vec<Message> {
        self.summary
            .iter()
            .map(|s| Message::user(s.clone()))
            .chain(self.retained.iter().map(ChatMessage::to_llm))
            .collect()
    }

    /// Most recent user-authored retained turn. The summary turn is not a
    /// candidate.
    pub fn latest_user_query(&self) -> Option<&str> {
        self.retained
            .iter()
            .rev()
            .find(|m| m.is_user())
            .map(|m| m.content.as_str())
    }
}

/// Wrap summary text for insertion into the history.
pub fn summary_turn(text: &str) -> String {
    format!("<system_summary>{}</system_summary>", text)
}

// ─────────────────────────────────────────────────────────────────────────────
// HistoryCompactor
// ─────────────────────────────────────────────────────────────────────────────

/// Bounds conversation length by summarizing older turns.
pub struct HistoryCompactor {
    backend: SharedBackend,
    config: CompactorConfig,
}

impl HistoryCompactor {
    pub fn new(backend: SharedBackend, config: CompactorConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &CompactorConfig {
        &self.config
    }

    /// Prepare `messages` for a chat session. Never fails.
    pub async fn compact(&self, conversation_id: &str, messages: &[ChatMessage]) -> CompactedHistory {
        if messages.len() <= self.config.threshold {
            return CompactedHistory {
                summary: None,
                retained: messages.to_vec(),
                outcome: CompactionOutcome::Untouched,
            };
        }

        tracing::info!(
            conversation_id,
            messages = messages.len(),
            "History above threshold, summarizing"
        );

        let split = messages.len().saturating_sub(self.config.preserve_recent);
        let mut request_messages: Vec<Message> =
            messages[..split].iter().map(ChatMessage::to_llm).collect();
        request_messages.push(Message::user(SUMMARY_INSTRUCTION));

        let request = CompletionRequest::new(&self.config.model, request_messages, SUMMARY_MAX_TOKENS)
            .with_temperature(0.0);

        match self.backend.complete(request).await {
            Ok(response) => {
                let text = response.text_checked().unwrap_or_else(|e| {
                    tracing::warn!(conversation_id, error = %e, "Summary was blocked or empty");
                    format!("Error during summarization: {}", e)
                });
                tracing::info!(conversation_id, summarized = split, "Summarization complete");
                CompactedHistory {
                    summary: Some(summary_turn(&text)),
                    retained: messages[split..].to_vec(),
                    outcome: CompactionOutcome::Summarized,
                }
            }
            Err(e) => {
                tracing::warn!(
                    conversation_id,
                    error = %e,
                    "Summarization failed, using truncated history"
                );
                let start = messages.len().saturating_sub(self.config.fallback_window);
                CompactedHistory {
                    summary: None,
                    retained: messages[start..].to_vec(),
                    outcome: CompactionOutcome::Truncated,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vulnscope_llm::{
        CompletionResponse, ContentBlock, LlmError, MockBackend, MockResponse, Role, StopReason,
        Usage,
    };

    fn conversation(n: usize) -> Vec<ChatMessage> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("q{i}"))
                } else {
                    ChatMessage::assistant(format!("a{i}"))
                }
            })
            .collect()
    }

    fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse::new(
            "s",
            "gemini-2.5-flash-lite",
            vec![ContentBlock::text(text)],
            StopReason::EndTurn,
            Usage::default(),
        )
    }

    fn compactor(backend: Arc<MockBackend>) -> HistoryCompactor {
        HistoryCompactor::new(backend, CompactorConfig::default())
    }

    #[tokio::test]
    async fn test_short_history_untouched() {
        let backend = Arc::new(MockBackend::new(vec![]));
        let history = compactor(backend.clone()).compact("c", &conversation(10)).await;

        assert_eq!(history.outcome, CompactionOutcome::Untouched);
        assert_eq!(history.retained.len(), 10);
        assert!(history.summary.is_none());
        assert_eq!(backend.request_count(), 0);
    }

    #[tokio::test]
    async fn test_summarizes_all_but_last_four() {
        let backend = Arc::new(MockBackend::new(vec![text_response(
            "Summary of previous conversation: IT market.",
        )]));
        let messages = conversation(12);
        let history = compactor(backend.clone()).compact("c", &messages).await;

        assert_eq!(history.outcome, CompactionOutcome::Summarized);
        assert_eq!(
            history.summary.as_deref(),
            Some("<system_summary>Summary of previous conversation: IT market.</system_summary>")
        );
        assert_eq!(history.retained, messages[8..].to_vec());

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.model, "gemini-2.5-flash-lite");
        assert_eq!(req.temperature, Some(0.0));
        assert!(req.tools.is_empty());
        // 8 summarized turns plus the instruction.
        assert_eq!(req.messages.len(), 9);
        assert_eq!(req.messages[1].role, Role::Assistant);
        assert_eq!(req.messages[8].content.to_text(), SUMMARY_INSTRUCTION);

        let msgs = history.to_messages();
        assert_eq!(msgs.len(), 5);
        assert_eq!(msgs[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_blocked_summary_carries_error_text() {
        let blocked = CompletionResponse::new(
            "s",
            "m",
            vec![],
            StopReason::Safety,
            Usage::default(),
        );
        let backend = Arc::new(MockBackend::new(vec![blocked]));
        let history = compactor(backend).compact("c", &conversation(11)).await;

        assert_eq!(history.outcome, CompactionOutcome::Summarized);
        let summary = history.summary.unwrap();
        assert!(summary.starts_with("<system_summary>Error during summarization: "));
        assert!(summary.ends_with("</system_summary>"));
        assert_eq!(history.retained.len(), 4);
    }

    #[tokio::test]
    async fn test_call_failure_truncates_to_last_ten() {
        let backend = Arc::new(MockBackend::with_results(vec![MockResponse::Error(
            LlmError::Network("connection reset".into()),
        )]));
        let messages = conversation(15);
        let history = compactor(backend).compact("c", &messages).await;

        assert_eq!(history.outcome, CompactionOutcome::Truncated);
        assert!(history.summary.is_none());
        assert_eq!(history.retained, messages[5..].to_vec());
    }

    /// A compacted history as the client would send it back next time.
    fn resent(history: &CompactedHistory) -> Vec<ChatMessage> {
        history
            .summary
            .iter()
            .map(|s| ChatMessage::user(s.clone()))
            .chain(history.retained.iter().cloned())
            .collect()
    }

    #[tokio::test]
    async fn test_recompacting_is_a_no_op() {
        let backend = Arc::new(MockBackend::new(vec![text_response(
            "Summary of previous conversation: DE market.",
        )]));
        let compactor = compactor(backend.clone());

        let first = compactor.compact("c", &conversation(14)).await;
        assert_eq!(first.outcome, CompactionOutcome::Summarized);
        let once = resent(&first);
        assert_eq!(once.len(), 5);

        let second = compactor.compact("c", &once).await;
        assert_eq!(second.outcome, CompactionOutcome::Untouched);
        assert!(second.summary.is_none());
        assert_eq!(second.retained, once);
        assert_eq!(resent(&second), once);
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn test_recompacting_truncated_history_is_a_no_op() {
        let backend = Arc::new(MockBackend::with_results(vec![MockResponse::Error(
            LlmError::Network("connection reset".into()),
        )]));
        let compactor = compactor(backend.clone());

        let once = resent(&compactor.compact("c", &conversation(13)).await);
        assert_eq!(once.len(), 10);

        let second = compactor.compact("c", &once).await;
        assert_eq!(second.outcome, CompactionOutcome::Untouched);
        assert_eq!(second.retained, once);
        assert_eq!(backend.request_count(), 1);
    }

    #[test]
    fn test_latest_user_query_ignores_summary() {
        let history = CompactedHistory {
            summary: Some(summary_turn("s")),
            retained: vec![ChatMessage::assistant("a"), ChatMessage::assistant("b")],
            outcome: CompactionOutcome::Summarized,
        };
        assert_eq!(history.latest_user_query(), None);

        let history = CompactedHistory {
            summary: None,
            retained: vec![
                ChatMessage::user("first"),
                ChatMessage::assistant("a"),
                ChatMessage::user("second"),
                ChatMessage::assistant("b"),
            ],
            outcome: CompactionOutcome::Untouched,
        };
        assert_eq!(history.latest_user_query(), Some("second"));
    }
}
