//! # Session State
//!
//! One logical problem-solving conversation: ordered history, attempt
//! bookkeeping, and the attempt budget. All state is in-memory and owned by
//! the session controller; nothing persists across sessions.

use crate::attempt::AttemptTracker;
use crate::provider::ChatMessage;

/// Whether attempts continue without a fresh human turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContinuationPolicy {
    /// Each attempt waits for the next user message
    #[default]
    Manual,
    /// The controller feeds each execution report back as the next user turn
    /// until a terminal condition fires
    Auto,
}

/// Session-level knobs
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum refinement attempts before the session terminates
    pub max_attempts: usize,
    pub continuation: ContinuationPolicy,
    /// Keep at most this many user/assistant exchanges in history
    pub max_history: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            continuation: ContinuationPolicy::Manual,
            max_history: None,
        }
    }
}

/// Conversation history plus attempt state for one session
#[derive(Debug, Clone, Default)]
pub struct Session {
    history: Vec<ChatMessage>,
    tracker: AttemptTracker,
    config: SessionConfig,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            history: Vec::new(),
            tracker: AttemptTracker::new(),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Chronological conversation history fed to the model
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn tracker(&self) -> &AttemptTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut AttemptTracker {
        &mut self.tracker
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.history.push(ChatMessage::user(content));
        self.trim_history();
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.history.push(ChatMessage::assistant(content));
        self.trim_history();
    }

    /// True once the attempt budget is spent
    pub fn budget_exhausted(&self) -> bool {
        self.tracker.attempts_made() >= self.config.max_attempts
    }

    /// Terminal boundary: clear attempt state, retain history.
    /// The next user turn starts a fresh session over the same conversation.
    pub fn end_session(&mut self) {
        self.tracker.reset();
    }

    fn trim_history(&mut self) {
        if let Some(max) = self.config.max_history {
            let cap = max * 2;
            if self.history.len() > cap {
                self.history.drain(..self.history.len() - cap);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::ExecutionResult;

    fn result(rate: f64) -> ExecutionResult {
        ExecutionResult {
            succeeded: true,
            stdout: String::new(),
            stderr: String::new(),
            error: None,
            success_rate: rate,
        }
    }

    #[test]
    fn test_history_is_ordered() {
        let mut session = Session::new(SessionConfig::default());
        session.push_user("write a sort");
        session.push_assistant("here you go");
        session.push_user("it fails on empty input");

        let roles: Vec<_> = session.history().iter().map(|m| m.content.clone()).collect();
        assert_eq!(roles, vec!["write a sort", "here you go", "it fails on empty input"]);
    }

    #[test]
    fn test_budget_exhaustion() {
        let mut session = Session::new(SessionConfig {
            max_attempts: 3,
            ..Default::default()
        });

        for i in 0..3 {
            assert!(!session.budget_exhausted());
            session.tracker_mut().record(&format!("try{}", i), &result(10.0));
        }
        assert!(session.budget_exhausted());
    }

    #[test]
    fn test_end_session_clears_attempts_keeps_history() {
        let mut session = Session::new(SessionConfig::default());
        session.push_user("task");
        session.tracker_mut().record("code", &result(40.0));
        assert!(session.tracker().best().is_some());

        session.end_session();

        assert!(session.tracker().best().is_none());
        assert!(session.tracker().last_failed().is_none());
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_history_trimming() {
        let mut session = Session::new(SessionConfig {
            max_history: Some(2),
            ..Default::default()
        });

        for i in 0..6 {
            session.push_user(format!("u{}", i));
            session.push_assistant(format!("a{}", i));
        }

        assert_eq!(session.history().len(), 4);
        assert_eq!(session.history()[0].content, "u4");
    }
}
