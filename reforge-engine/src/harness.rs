//! # Execution Harness
//!
//! Runs an untrusted code snippet in a child interpreter process, capturing
//! stdout and stderr separately and enforcing a wall-clock timeout.
//!
//! ## Test-report channel
//!
//! Instead of inspecting the interpreter's namespace, the harness defines an
//! explicit reporting contract: the snippet prints a single line starting with
//! [`TEST_RESULTS_MARKER`] followed by a JSON array of `{"passed": bool}`
//! records. The harness parses that line into [`TestOutcome`]s, strips it from
//! the reported stdout, and derives the success rate. A snippet that reports
//! nothing scores 0, even when it ran cleanly.
//!
//! All failure modes (spawn error, runtime error, timeout) fold into the
//! returned [`ExecutionResult`]; `run` never fails outright, so a misbehaving
//! snippet can never take the session down with it.

use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Marker prefix a snippet uses to report its test outcomes on stdout.
pub const TEST_RESULTS_MARKER: &str = "__TEST_RESULTS__";

/// A single self-reported test outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub passed: bool,
}

/// The captured result of one snippet execution.
///
/// Immutable once produced; a fresh one is computed for every attempt.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Code ran cleanly: stderr is textually empty and no harness-level error
    pub succeeded: bool,
    /// Captured standard output, with test-report marker lines removed
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Failure text: spawn/timeout/wait errors, or the captured stderr when
    /// the run produced any
    pub error: Option<String>,
    /// Percentage of reported test outcomes that passed, in [0, 100].
    /// 0 when nothing was reported.
    pub success_rate: f64,
}

impl ExecutionResult {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(error.into()),
            success_rate: 0.0,
        }
    }
}

/// Configuration for the harness: which interpreter to run and for how long
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Interpreter program (e.g. "python3")
    pub program: String,
    /// Arguments placed before the snippet (e.g. ["-c"])
    pub args: Vec<String>,
    /// Wall-clock limit for one execution
    pub timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec!["-c".to_string()],
            timeout: Duration::from_secs(60),
        }
    }
}

/// Executes snippets in an isolated child process
#[derive(Debug, Clone, Default)]
pub struct Harness {
    config: HarnessConfig,
}

impl Harness {
    /// Create a harness with the default interpreter (python3, 60s timeout)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HarnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run a snippet and capture everything.
    ///
    /// Never returns an error: failures are reported through
    /// `ExecutionResult.error`. Attempts are strictly sequential; callers must
    /// not run two executions for the same session concurrently.
    pub async fn run(&self, snippet: &str) -> ExecutionResult {
        let child = Command::new(&self.config.program)
            .args(&self.config.args)
            .arg(snippet)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(c) => c,
            Err(e) => {
                return ExecutionResult::failed(format!(
                    "failed to launch interpreter '{}': {}",
                    self.config.program, e
                ));
            }
        };

        // Dropping the wait future kills the child (kill_on_drop)
        let output = match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return ExecutionResult::failed(format!("failed to collect output: {}", e));
            }
            Err(_) => {
                return ExecutionResult::failed(format!(
                    "code execution timed out after {} seconds",
                    self.config.timeout.as_secs()
                ));
            }
        };

        let raw_stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        let (stdout, outcomes) = split_test_report(&raw_stdout);
        let success_rate = score(&outcomes);

        let error = if stderr.is_empty() {
            None
        } else {
            Some(stderr.clone())
        };

        ExecutionResult {
            succeeded: stderr.is_empty(),
            stdout,
            stderr,
            error,
            success_rate,
        }
    }
}

/// Split captured stdout into user-visible output and reported test outcomes.
///
/// The first well-formed marker line wins; every marker line is stripped from
/// the returned stdout either way.
fn split_test_report(raw: &str) -> (String, Vec<TestOutcome>) {
    let mut outcomes: Option<Vec<TestOutcome>> = None;
    let mut kept = Vec::new();

    for line in raw.lines() {
        if let Some(rest) = line.trim_start().strip_prefix(TEST_RESULTS_MARKER) {
            if outcomes.is_none() {
                if let Ok(parsed) = serde_json::from_str::<Vec<TestOutcome>>(rest.trim()) {
                    outcomes = Some(parsed);
                }
            }
            continue;
        }
        kept.push(line);
    }

    let mut stdout = kept.join("\n");
    if raw.ends_with('\n') && !stdout.is_empty() {
        stdout.push('\n');
    }

    (stdout, outcomes.unwrap_or_default())
}

/// Success rate = 100 * passed / total, or 0 for an empty report
fn score(outcomes: &[TestOutcome]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    let passed = outcomes.iter().filter(|o| o.passed).count();
    (passed as f64 / outcomes.len() as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_harness(timeout: Duration) -> Harness {
        Harness::with_config(HarnessConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string()],
            timeout,
        })
    }

    #[tokio::test]
    async fn test_clean_run_without_report_scores_zero() {
        let harness = sh_harness(Duration::from_secs(5));
        let result = harness.run("echo hello").await;

        assert!(result.succeeded);
        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.stderr, "");
        assert_eq!(result.error, None);
        assert_eq!(result.success_rate, 0.0);
    }

    #[tokio::test]
    async fn test_reported_outcomes_drive_success_rate() {
        let harness = sh_harness(Duration::from_secs(5));
        let snippet = r#"echo running tests
echo '__TEST_RESULTS__ [{"passed":true},{"passed":false}]'"#;
        let result = harness.run(snippet).await;

        assert!(result.succeeded);
        assert_eq!(result.success_rate, 50.0);
        // The marker line is part of the report channel, not the output
        assert_eq!(result.stdout, "running tests\n");
    }

    #[tokio::test]
    async fn test_all_passed_scores_hundred() {
        let harness = sh_harness(Duration::from_secs(5));
        let snippet = r#"echo '__TEST_RESULTS__ [{"passed":true},{"passed":true},{"passed":true}]'"#;
        let result = harness.run(snippet).await;

        assert_eq!(result.success_rate, 100.0);
    }

    #[tokio::test]
    async fn test_empty_report_scores_zero() {
        let harness = sh_harness(Duration::from_secs(5));
        let result = harness.run("echo '__TEST_RESULTS__ []'").await;

        assert!(result.succeeded);
        assert_eq!(result.success_rate, 0.0);
    }

    #[tokio::test]
    async fn test_runtime_failure_sets_error_from_stderr() {
        let harness = sh_harness(Duration::from_secs(5));
        let result = harness.run("echo boom >&2; exit 1").await;

        assert!(!result.succeeded);
        assert!(result.stderr.contains("boom"));
        assert_eq!(result.success_rate, 0.0);
        assert!(result.error.expect("stderr should fold into error").contains("boom"));
    }

    #[tokio::test]
    async fn test_partial_report_before_failure_still_counts() {
        let harness = sh_harness(Duration::from_secs(5));
        let snippet = r#"echo '__TEST_RESULTS__ [{"passed":true}]'
echo later failure >&2
exit 1"#;
        let result = harness.run(snippet).await;

        assert!(!result.succeeded);
        assert_eq!(result.success_rate, 100.0);
    }

    #[tokio::test]
    async fn test_timeout_is_reported_not_raised() {
        let harness = sh_harness(Duration::from_millis(200));
        let result = harness.run("sleep 5").await;

        assert!(!result.succeeded);
        let err = result.error.expect("timeout should set error");
        assert!(err.contains("timed out"));
        assert_eq!(result.success_rate, 0.0);
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_reported_not_raised() {
        let harness = Harness::with_config(HarnessConfig {
            program: "definitely-not-an-interpreter".to_string(),
            args: vec![],
            timeout: Duration::from_secs(1),
        });
        let result = harness.run("whatever").await;

        assert!(!result.succeeded);
        assert!(result.error.expect("spawn failure").contains("failed to launch"));
    }

    #[test]
    fn test_split_keeps_surrounding_output() {
        let raw = "before\n__TEST_RESULTS__ [{\"passed\":false}]\nafter\n";
        let (stdout, outcomes) = split_test_report(raw);
        assert_eq!(stdout, "before\nafter\n");
        assert_eq!(outcomes, vec![TestOutcome { passed: false }]);
    }

    #[test]
    fn test_malformed_report_is_ignored() {
        let raw = "__TEST_RESULTS__ not json\n";
        let (_, outcomes) = split_test_report(raw);
        assert!(outcomes.is_empty());
        assert_eq!(score(&outcomes), 0.0);
    }

    #[test]
    fn test_score_rounding() {
        let outcomes = vec![
            TestOutcome { passed: true },
            TestOutcome { passed: true },
            TestOutcome { passed: false },
        ];
        assert!((score(&outcomes) - 200.0 / 3.0).abs() < 1e-9);
    }
}
