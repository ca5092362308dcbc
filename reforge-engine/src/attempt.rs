//! # Attempt Tracker
//!
//! Keeps the best-scoring attempt and the most recent failing attempt across
//! a session, and produces truncated digests for prompt construction.

use crate::harness::ExecutionResult;

/// One generate-then-execute round within a session
#[derive(Debug, Clone)]
pub struct Attempt {
    pub code: String,
    pub output: String,
    pub error: Option<String>,
    pub success_rate: f64,
    /// Explicit per-session counter, starting at 1 and restarting after reset
    pub ordinal: usize,
}

/// How an attempt ranked against the session so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// 100% success rate: terminal, slots untouched (reset follows)
    Solved,
    /// Beat the previous best; best slot replaced
    Improved,
    /// Did not improve; last-failed slot replaced
    Stalled,
}

/// Best/last-failed bookkeeping for one session.
///
/// Invariant: the best attempt's success rate never decreases, and the
/// last-failed slot only changes when a new attempt fails to beat the best.
#[derive(Debug, Clone, Default)]
pub struct AttemptTracker {
    best: Option<Attempt>,
    last_failed: Option<Attempt>,
    attempts_made: usize,
}

/// Preview length used in digests, matching the prompt-size budget
const DIGEST_PREVIEW_CHARS: usize = 30;

impl AttemptTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one attempt. Must be called exactly once per attempt; the
    /// controller owns that cadence.
    pub fn record(&mut self, code: &str, result: &ExecutionResult) -> Verdict {
        self.attempts_made += 1;

        if result.success_rate >= 100.0 {
            return Verdict::Solved;
        }

        let attempt = Attempt {
            code: code.to_string(),
            output: result.stdout.clone(),
            error: result.error.clone(),
            success_rate: result.success_rate,
            ordinal: self.attempts_made,
        };

        if attempt.success_rate > self.best_rate() {
            self.best = Some(attempt);
            Verdict::Improved
        } else {
            self.last_failed = Some(attempt);
            Verdict::Stalled
        }
    }

    pub fn best(&self) -> Option<&Attempt> {
        self.best.as_ref()
    }

    pub fn last_failed(&self) -> Option<&Attempt> {
        self.last_failed.as_ref()
    }

    /// Highest success rate seen so far, 0 before any improvement
    pub fn best_rate(&self) -> f64 {
        self.best.as_ref().map(|a| a.success_rate).unwrap_or(0.0)
    }

    /// Attempts recorded since the last reset
    pub fn attempts_made(&self) -> usize {
        self.attempts_made
    }

    /// Digest of the best attempt for prompt construction. Previews only,
    /// never the full code body.
    pub fn best_digest(&self) -> Option<String> {
        self.best.as_ref().map(|a| {
            format!(
                "Best Solution (Attempt {}):\nCode: {}...\nSuccess Rate: {}%",
                a.ordinal,
                truncate(&a.code, DIGEST_PREVIEW_CHARS),
                a.success_rate
            )
        })
    }

    /// Digest of the most recent failing attempt for prompt construction
    pub fn failed_digest(&self) -> Option<String> {
        self.last_failed.as_ref().map(|a| {
            format!(
                "Last Failed Attempt:\nCode: {}...\nError: {}...\nSuccess Rate: {}%",
                truncate(&a.code, DIGEST_PREVIEW_CHARS),
                truncate(a.error.as_deref().unwrap_or("None"), DIGEST_PREVIEW_CHARS),
                a.success_rate
            )
        })
    }

    /// Clear both slots and restart ordinals; called at session boundaries
    pub fn reset(&mut self) {
        self.best = None;
        self.last_failed = None;
        self.attempts_made = 0;
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}
