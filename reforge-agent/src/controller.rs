//! Session controller - orchestrates the generate/execute/score loop
//!
//! One turn walks Generating -> Parsing -> (Executing -> Scoring) -> Deciding.
//! `handle_input` wraps the turn with the continuation policy: Manual returns
//! after every attempt, Auto feeds each execution report back as the next
//! user message until a terminal condition fires.

use reforge_engine::{
    parse_response, summarize_history, AttemptTracker, ChatMessage, CompletionRequest,
    ContinuationPolicy, ExecutionResult, Harness, LlmProvider, ParsedResponse, Session,
    SessionConfig, StreamChunk, SummaryMode, UsageTracker, Verdict, WebSearch,
    TEST_RESULTS_MARKER,
};

/// Configuration for the controller
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Enable verbose logging
    pub verbose: bool,
    /// Model override; the provider default is used when None
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub top_p: f32,
    /// Stream the response and concatenate deltas before parsing
    pub stream: bool,
    /// How the conversation digest is produced
    pub summary: SummaryMode,
    /// Session-level knobs (attempt budget, continuation policy)
    pub session: SessionConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            verbose: true,
            model: None,
            temperature: 0.7,
            max_tokens: 2048,
            top_p: 0.5,
            stream: false,
            summary: SummaryMode::Model,
            session: SessionConfig::default(),
        }
    }
}

/// Why a session terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model emitted the terminal sentinel
    Sentinel,
    /// An attempt reached a 100% success rate
    AllTestsPassed,
    /// The attempt budget ran out without a terminal attempt
    BudgetExhausted,
}

/// Code plus its captured execution, surfaced to the interface
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub code: String,
    pub result: ExecutionResult,
}

/// Result of one user turn
#[derive(Debug)]
pub enum TurnOutcome {
    /// Terminal: the session ended and attempt state was reset
    Final {
        response: String,
        reason: StopReason,
        report: Option<ExecutionReport>,
    },
    /// Non-terminal: the loop continues with the next turn
    Continue {
        response: String,
        report: Option<ExecutionReport>,
    },
    /// The backend call failed; the session is unchanged and usable
    BackendError { message: String },
}

/// The refinement-session controller.
///
/// Owns the session state exclusively; attempts are strictly sequential.
pub struct SessionController<P: LlmProvider> {
    provider: P,
    session: Session,
    harness: Harness,
    search: Option<WebSearch>,
    usage: UsageTracker,
    config: AgentConfig,
}

impl<P: LlmProvider> SessionController<P> {
    pub fn new(provider: P, config: AgentConfig) -> Self {
        let session = Session::new(config.session.clone());
        Self {
            provider,
            session,
            harness: Harness::new(),
            search: None,
            usage: UsageTracker::new(),
            config,
        }
    }

    /// Replace the default harness (interpreter, timeout)
    pub fn with_harness(mut self, harness: Harness) -> Self {
        self.harness = harness;
        self
    }

    /// Enable the web-search collaborator
    pub fn with_search(mut self, search: WebSearch) -> Self {
        self.search = Some(search);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Process one user message under the configured continuation policy
    pub async fn handle_input(&mut self, input: &str) -> TurnOutcome {
        let mut message = input.to_string();

        loop {
            let outcome = self.run_turn(&message).await;

            match (&outcome, self.config.session.continuation) {
                (TurnOutcome::Continue { report: Some(report), .. }, ContinuationPolicy::Auto) => {
                    // Feed the execution result back as the next user turn
                    message = execution_feedback(report);
                    if self.config.verbose {
                        println!("   Auto-continuing with execution feedback");
                    }
                }
                _ => return outcome,
            }
        }
    }

    /// One pass of the state machine for a single user message
    async fn run_turn(&mut self, input: &str) -> TurnOutcome {
        self.session.push_user(input);

        // Generating
        let response = match self.generate().await {
            Ok(text) => text,
            Err(message) => {
                if self.config.verbose {
                    eprintln!("Backend error: {}", message);
                }
                return TurnOutcome::BackendError { message };
            }
        };

        // Parsing
        let snippet = match parse_response(&response) {
            ParsedResponse::Final => {
                if self.config.verbose {
                    println!("   Sentinel seen - final answer");
                }
                self.session.end_session();
                return TurnOutcome::Final {
                    response,
                    reason: StopReason::Sentinel,
                    report: None,
                };
            }
            ParsedResponse::Chat => {
                self.session.push_assistant(&response);
                return TurnOutcome::Continue {
                    response,
                    report: None,
                };
            }
            ParsedResponse::Code(snippet) => snippet,
        };

        // Executing
        if self.config.verbose {
            println!("   Executing attempt ({} chars)", snippet.len());
        }
        let result = self.harness.run(&snippet).await;

        // Scoring
        let verdict = self.session.tracker_mut().record(&snippet, &result);
        if self.config.verbose {
            println!(
                "   Attempt {}: success rate {}%, verdict {:?}",
                self.session.tracker().attempts_made(),
                result.success_rate,
                verdict
            );
        }

        let report = ExecutionReport {
            code: snippet,
            result,
        };

        // Deciding
        if verdict == Verdict::Solved {
            self.session.end_session();
            return TurnOutcome::Final {
                response,
                reason: StopReason::AllTestsPassed,
                report: Some(report),
            };
        }

        self.session.push_assistant(&response);

        if self.session.budget_exhausted() {
            if self.config.verbose {
                println!(
                    "   Attempt budget ({}) exhausted",
                    self.session.config().max_attempts
                );
            }
            self.session.end_session();
            return TurnOutcome::Final {
                response,
                reason: StopReason::BudgetExhausted,
                report: Some(report),
            };
        }

        TurnOutcome::Continue {
            response,
            report: Some(report),
        }
    }

    /// Build the prompt and invoke the backend; streamed deltas are collected
    /// to completion before the response is considered usable.
    async fn generate(&mut self) -> Result<String, String> {
        let digest =
            summarize_history(&self.provider, self.config.summary, self.session.history()).await;

        let newest = self
            .session
            .history()
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let mut messages = vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::system(format!("Context summary:\n{}", digest)),
        ];

        let tracker: &AttemptTracker = self.session.tracker();
        if let Some(best) = tracker.best_digest() {
            messages.push(ChatMessage::system(best));
        }
        if let Some(failed) = tracker.failed_digest() {
            messages.push(ChatMessage::system(failed));
        }

        if let Some(search) = &self.search {
            let results = search.search(&newest).await;
            messages.push(ChatMessage::system(format!(
                "Web search results:\n{}",
                results.join("\n\n")
            )));
        }

        messages.push(ChatMessage::user(&newest));

        if self.config.verbose {
            println!("   Asking LLM ({} prompt messages)...", messages.len());
        }

        let mut request = CompletionRequest::new(messages)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
            .with_top_p(self.config.top_p);
        if let Some(model) = &self.config.model {
            request = request.with_model(model.clone());
        }

        let content = if self.config.stream {
            let model = request
                .model
                .clone()
                .unwrap_or_else(|| self.provider.default_model().to_string());
            let mut receiver = self
                .provider
                .stream(request.with_streaming(true))
                .await
                .map_err(|e| format!("An error occurred: {}", e))?;

            let mut text = String::new();
            loop {
                match receiver.next_chunk().await {
                    Some(StreamChunk::Text(delta)) => text.push_str(&delta),
                    Some(StreamChunk::Done { usage, .. }) => {
                        if let Some(usage) = &usage {
                            self.usage.track(&model, usage);
                        }
                        break;
                    }
                    Some(StreamChunk::Error(e)) => {
                        return Err(format!("An error occurred: {}", e));
                    }
                    None => break,
                }
            }
            text
        } else {
            let response = self
                .provider
                .complete(request)
                .await
                .map_err(|e| format!("An error occurred: {}", e))?;
            self.usage.track(&response.model, &response.usage);
            response
                .content
                .ok_or_else(|| "An error occurred: empty response from backend".to_string())?
        };

        if self.config.verbose {
            println!("   Response: {} chars", content.len());
        }

        Ok(content.trim().to_string())
    }

    fn system_prompt(&self) -> String {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        format!(
            "You are an EXPERT coding LLM specializing in iterative code refinement. \
             Your task is to generate, debug, and optimize code through multiple attempts. \
             Follow these guidelines:\n\
             1. Use only 1 code block per response, enclosed in triple backticks (```).\n\
             2. Include complete, executable code with test cases in each attempt.\n\
             3. Each code block MUST include:\n   \
                - The main solution/function\n   \
                - Test cases with expected outputs\n   \
                - Code to execute tests and print results.\n   \
                - Report test results by printing one line: {marker} followed by a JSON \
                  array of {{\"passed\": true/false}} records, one per test case.\n\
             4. Analyze previous attempts and execution results before generating new code.\n\
             5. Explain your reasoning and test case selection before providing code.\n\
             6. If code fails, identify the error and propose fixes.\n\
             7. If tests fail, analyze patterns and improve the solution.\n\
             8. If code is slow or suboptimal, suggest optimizations.\n\
             9. If an approach fails repeatedly, consider alternative solutions.\n\
             10. When you are satisfied with the solution and it passes all tests, include \
                 the token FINAL_ANSWER in your response.\n\
             Maximum refinement attempts: {max_attempts}\n\
             Current date and time: {now}",
            marker = TEST_RESULTS_MARKER,
            max_attempts = self.session.config().max_attempts,
            now = now,
        )
    }
}

/// Synthesized user turn used by the Auto continuation policy
fn execution_feedback(report: &ExecutionReport) -> String {
    format!(
        "Previous Code Output:\n{}\nError: {}\nSuccess Rate: {}%\n\
         Analyze the execution result and improve the solution.",
        report.result.stdout.trim(),
        report.result.error.as_deref().unwrap_or("None"),
        report.result.success_rate,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use reforge_engine::{
        CompletionResponse, FinishReason, HarnessConfig, ProviderError, StreamChunk,
        StreamReceiver, Usage,
    };
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Provider that pops canned replies and records every request
    struct Scripted {
        replies: Mutex<VecDeque<Result<String, ProviderError>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl Scripted {
        fn with(replies: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
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
            request: CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
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
                // Split the canned reply into a few deltas
                for chunk in text.as_bytes().chunks(7) {
                    yield StreamChunk::Text(String::from_utf8_lossy(chunk).into_owned());
                }
                yield StreamChunk::Done {
                    finish_reason: FinishReason::Stop,
                    usage: Some(Usage {
                        prompt_tokens: 3,
                        completion_tokens: 7,
                        total_tokens: 10,
                    }),
                };
            };
            Ok(StreamReceiver::new(stream))
        }
    }

    fn test_config() -> AgentConfig {
        AgentConfig {
            verbose: false,
            summary: SummaryMode::Recency { max_entries: 3 },
            ..Default::default()
        }
    }

    fn sh_harness() -> Harness {
        Harness::with_config(HarnessConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string()],
            timeout: Duration::from_secs(5),
        })
    }

    fn controller(
        replies: Vec<Result<String, ProviderError>>,
        config: AgentConfig,
    ) -> SessionController<Scripted> {
        SessionController::new(Scripted::with(replies), config).with_harness(sh_harness())
    }

    fn passing_block() -> String {
        "Attempt below.\n```\necho '__TEST_RESULTS__ [{\"passed\":true},{\"passed\":true}]'\n```"
            .to_string()
    }

    fn failing_block() -> String {
        "Attempt below.\n```\necho '__TEST_RESULTS__ [{\"passed\":false}]'\n```".to_string()
    }

    #[tokio::test]
    async fn test_sentinel_terminates_without_execution() {
        let mut ctl = controller(
            vec![Ok("Everything checks out. FINAL_ANSWER".to_string())],
            test_config(),
        );

        match ctl.handle_input("write fizzbuzz").await {
            TurnOutcome::Final {
                reason: StopReason::Sentinel,
                report,
                ..
            } => assert!(report.is_none()),
            other => panic!("expected sentinel termination, got {:?}", other),
        }

        // Attempt state was cleared on termination
        assert!(ctl.session().tracker().best().is_none());
        assert_eq!(ctl.session().tracker().attempts_made(), 0);
    }

    #[tokio::test]
    async fn test_perfect_score_terminates_immediately() {
        let mut ctl = controller(vec![Ok(passing_block())], test_config());

        match ctl.handle_input("write fizzbuzz").await {
            TurnOutcome::Final {
                reason: StopReason::AllTestsPassed,
                report: Some(report),
                ..
            } => {
                assert_eq!(report.result.success_rate, 100.0);
                assert!(report.result.succeeded);
            }
            other => panic!("expected all-tests-passed termination, got {:?}", other),
        }

        assert!(ctl.session().tracker().best().is_none());
    }

    #[tokio::test]
    async fn test_chat_response_continues_without_execution() {
        let mut ctl = controller(
            vec![Ok("Which sort order do you want?".to_string())],
            test_config(),
        );

        match ctl.handle_input("sort my list").await {
            TurnOutcome::Continue { report, response } => {
                assert!(report.is_none());
                assert!(response.contains("Which sort order"));
            }
            other => panic!("expected chat continuation, got {:?}", other),
        }

        // The conversational turn landed in history
        let history = ctl.session().history();
        assert_eq!(history.last().unwrap().content, "Which sort order do you want?");
        assert_eq!(ctl.session().tracker().attempts_made(), 0);
    }

    #[tokio::test]
    async fn test_auto_policy_exhausts_budget_and_resets() {
        let config = AgentConfig {
            session: SessionConfig {
                continuation: ContinuationPolicy::Auto,
                max_attempts: 3,
                ..Default::default()
            },
            ..test_config()
        };
        let mut ctl = controller(
            vec![Ok(failing_block()), Ok(failing_block()), Ok(failing_block())],
            config,
        );

        match ctl.handle_input("write fizzbuzz").await {
            TurnOutcome::Final {
                reason: StopReason::BudgetExhausted,
                report: Some(_),
                ..
            } => {}
            other => panic!("expected budget termination, got {:?}", other),
        }

        // Reset followed termination
        assert_eq!(ctl.session().tracker().attempts_made(), 0);
        assert!(ctl.session().tracker().last_failed().is_none());
    }

    #[tokio::test]
    async fn test_manual_policy_returns_each_attempt() {
        let mut ctl = controller(vec![Ok(failing_block())], test_config());

        match ctl.handle_input("write fizzbuzz").await {
            TurnOutcome::Continue {
                report: Some(report),
                ..
            } => {
                assert_eq!(report.result.success_rate, 0.0);
            }
            other => panic!("expected continuation with report, got {:?}", other),
        }

        assert_eq!(ctl.session().tracker().attempts_made(), 1);
        assert!(ctl.session().tracker().last_failed().is_some());
    }

    #[tokio::test]
    async fn test_backend_error_is_non_fatal() {
        let mut ctl = controller(
            vec![
                Err(ProviderError::Network("connection refused".into())),
                Ok("Recovered fine.".to_string()),
            ],
            test_config(),
        );

        match ctl.handle_input("hello").await {
            TurnOutcome::BackendError { message } => {
                assert!(message.contains("connection refused"));
            }
            other => panic!("expected backend error, got {:?}", other),
        }

        // The session stays usable
        match ctl.handle_input("hello again").await {
            TurnOutcome::Continue { response, .. } => assert_eq!(response, "Recovered fine."),
            other => panic!("expected recovery, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_prompt_carries_digests_after_failed_attempt() {
        let provider = Scripted::with(vec![
            Ok(failing_block()),
            Ok("Let me think more.".to_string()),
        ]);
        let mut ctl =
            SessionController::new(provider, test_config()).with_harness(sh_harness());

        ctl.handle_input("write fizzbuzz").await;
        ctl.handle_input("try again").await;

        let requests = ctl.provider.requests();
        assert_eq!(requests.len(), 2);

        let second_prompt: Vec<&str> = requests[1]
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect();

        assert!(second_prompt.iter().any(|c| c.contains("Context summary:")));
        let failed_digest = second_prompt
            .iter()
            .find(|c| c.starts_with("Last Failed Attempt"))
            .expect("failed digest should be in the prompt");
        // The digest carries a preview, never the full code body
        assert!(!failed_digest.contains("[{\"passed\":false}]"));
    }

    #[tokio::test]
    async fn test_improving_attempt_fills_best_digest() {
        let improving = "Partial.\n```\necho '__TEST_RESULTS__ [{\"passed\":true},{\"passed\":false}]'\n```".to_string();
        let provider = Scripted::with(vec![Ok(improving), Ok("Thinking.".to_string())]);
        let mut ctl =
            SessionController::new(provider, test_config()).with_harness(sh_harness());

        ctl.handle_input("write fizzbuzz").await;
        assert_eq!(ctl.session().tracker().best_rate(), 50.0);

        ctl.handle_input("improve it").await;
        let requests = ctl.provider.requests();
        let second_prompt: Vec<&str> = requests[1]
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert!(second_prompt.iter().any(|c| c.contains("Best Solution (Attempt 1)")));
    }

    #[tokio::test]
    async fn test_streamed_response_is_joined_before_parsing() {
        let config = AgentConfig {
            stream: true,
            ..test_config()
        };
        let mut ctl = controller(vec![Ok(passing_block())], config);

        match ctl.handle_input("write fizzbuzz").await {
            TurnOutcome::Final {
                reason: StopReason::AllTestsPassed,
                ..
            } => {}
            other => panic!("expected termination from streamed response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_streaming_usage_is_tracked() {
        let config = AgentConfig {
            stream: true,
            ..test_config()
        };
        let mut ctl = controller(vec![Ok("Just a thought.".to_string())], config);

        ctl.handle_input("hello").await;

        assert_eq!(ctl.usage().total_calls, 1);
        assert_eq!(ctl.usage().total_prompt_tokens, 3);
        assert_eq!(ctl.usage().total_completion_tokens, 7);
    }

    #[tokio::test]
    async fn test_system_prompt_names_contract() {
        let ctl = controller(vec![], test_config());
        let prompt = ctl.system_prompt();
        assert!(prompt.contains(TEST_RESULTS_MARKER));
        assert!(prompt.contains("FINAL_ANSWER"));
        assert!(prompt.contains("Maximum refinement attempts: 3"));
    }
}
