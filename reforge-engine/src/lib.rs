//! # Reforge Engine
//!
//! Building blocks for iterative code refinement sessions.
//!
//! ## Core Concepts
//! - **Harness**: runs untrusted snippets in a child interpreter, captures
//!   stdout/stderr separately, scores self-reported test outcomes
//! - **Parser**: splits a model response into sentinel / code block / chat
//! - **Tracker**: best and last-failed attempt slots across a session
//! - **Session**: conversation history plus attempt budget
//! - **Summarizer**: bounds prompt size with a conversation digest
//! - **Provider**: trait-based LLM communication (OpenAI-compatible APIs)

pub mod attempt;
pub mod harness;
pub mod parse;
pub mod provider;
pub mod search;
pub mod session;
pub mod summary;

pub use attempt::{Attempt, AttemptTracker, Verdict};
pub use harness::{ExecutionResult, Harness, HarnessConfig, TestOutcome, TEST_RESULTS_MARKER};
pub use parse::{parse_response, ParsedResponse, SENTINEL_TOKEN};
pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, OpenAiProvider,
    ProviderConfig, ProviderError, ProviderType, Role, StreamChunk, StreamReceiver, Usage,
    UsageTracker,
};
pub use search::{SearchConfig, WebSearch};
pub use session::{ContinuationPolicy, Session, SessionConfig};
pub use summary::{summarize_history, SummaryMode};
