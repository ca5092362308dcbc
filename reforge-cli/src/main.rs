//! # Reforge CLI
//!
//! Interactive chat assistant with automated code refinement.
//!
//! Usage:
//!   reforge
//!   reforge --auto --max-attempts 5
//!   reforge --model qwen-2.5-coder-32b --stream
//!
//! The backend is chosen from the environment: GROQ_API_KEY, then
//! OPENAI_API_KEY, or an explicit --base-url for a local OpenAI-compatible
//! server. Input is multi-line, finished with an empty line; 'quit' exits.

use clap::Parser;
use reforge_agent::{AgentConfig, SessionController, StopReason, TurnOutcome};
use reforge_engine::{
    ContinuationPolicy, Harness, HarnessConfig, OpenAiProvider, ProviderConfig, SearchConfig,
    SessionConfig, SummaryMode, WebSearch,
};
use std::io::{self, BufRead, Write};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "reforge")]
#[command(author, version, about = "Reforge - iterative code refinement assistant")]
struct Cli {
    /// Model to use (provider default when omitted)
    #[arg(short, long)]
    model: Option<String>,

    /// Base URL of an OpenAI-compatible server (e.g. http://localhost:11434/v1)
    #[arg(long)]
    base_url: Option<String>,

    /// Maximum refinement attempts per session
    #[arg(long, default_value = "3")]
    max_attempts: usize,

    /// Auto-continue attempts by feeding execution results back to the model
    #[arg(long)]
    auto: bool,

    /// Stream the model response
    #[arg(long)]
    stream: bool,

    /// Enable the web-search collaborator (needs SEARCH_API_KEY and SEARCH_CX)
    #[arg(long)]
    search: bool,

    /// Interpreter used to run generated code
    #[arg(long, default_value = "python3")]
    interpreter: String,

    /// Wall-clock timeout for one code execution, in seconds
    #[arg(long, default_value = "60")]
    timeout: u64,

    /// Summarize context from the last N exchanges instead of a model call
    #[arg(long)]
    recency_summary: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - only show responses and results
    #[arg(short, long)]
    quiet: bool,
}

/// Reads multi-line input until an empty line; None on EOF
fn get_multiline_input(prompt: &str) -> Option<String> {
    println!("{}", prompt);
    let _ = io::stdout().flush();

    let stdin = io::stdin();
    let mut lines = Vec::new();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => return None,
        };
        if line.trim().is_empty() {
            break;
        }
        lines.push(line);
    }

    if lines.is_empty() {
        // EOF with nothing buffered ends the program
        return None;
    }
    Some(lines.join("\n"))
}

fn build_provider(cli: &Cli) -> Result<OpenAiProvider, String> {
    let mut config = if let Some(base_url) = &cli.base_url {
        let model = cli.model.clone().unwrap_or_else(|| "gpt-4o".to_string());
        ProviderConfig::local(base_url.clone(), model)
    } else if let Ok(key) = std::env::var("GROQ_API_KEY") {
        ProviderConfig::groq(key)
    } else if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        ProviderConfig::openai(key)
    } else {
        return Err(
            "No backend configured. Set GROQ_API_KEY or OPENAI_API_KEY, or pass --base-url."
                .to_string(),
        );
    };

    if let Some(model) = &cli.model {
        config = config.with_model(model.clone());
    }

    OpenAiProvider::new(config).map_err(|e| e.to_string())
}

fn build_search() -> Result<WebSearch, String> {
    let api_key = std::env::var("SEARCH_API_KEY")
        .map_err(|_| "SEARCH_API_KEY not set".to_string())?;
    let cx = std::env::var("SEARCH_CX").map_err(|_| "SEARCH_CX not set".to_string())?;
    WebSearch::new(SearchConfig::new(api_key, cx)).map_err(|e| e.to_string())
}

fn print_report(report: &reforge_agent::ExecutionReport) {
    println!("\nGenerated Code:");
    println!("{}", report.code);
    println!("\nExecution Result:");
    println!("  Output: {}", report.result.stdout.trim());
    let error = report.result.error.as_deref().unwrap_or("None");
    println!("  Error: {}", error.trim());
    println!("  Success Rate: {}%", report.result.success_rate);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let provider = match build_provider(&cli) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let config = AgentConfig {
        verbose: cli.verbose && !cli.quiet,
        model: cli.model.clone(),
        stream: cli.stream,
        summary: match cli.recency_summary {
            Some(max_entries) => SummaryMode::Recency { max_entries },
            None => SummaryMode::Model,
        },
        session: SessionConfig {
            max_attempts: cli.max_attempts,
            continuation: if cli.auto {
                ContinuationPolicy::Auto
            } else {
                ContinuationPolicy::Manual
            },
            max_history: None,
        },
        ..Default::default()
    };

    let harness = Harness::with_config(HarnessConfig {
        program: cli.interpreter.clone(),
        args: vec!["-c".to_string()],
        timeout: Duration::from_secs(cli.timeout),
    });

    let mut controller = SessionController::new(provider, config).with_harness(harness);

    if cli.search {
        match build_search() {
            Ok(search) => controller = controller.with_search(search),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }

    if !cli.quiet {
        println!(
            "Reforge - chat assistant with automated code refinement \
             (type 'quit' to exit, press Enter twice to finish multi-line input)"
        );
    }

    loop {
        let user_input = match get_multiline_input("\nYou: ") {
            Some(input) => input,
            None => break,
        };
        if user_input.trim().eq_ignore_ascii_case("quit") {
            break;
        }

        match controller.handle_input(&user_input).await {
            TurnOutcome::Final {
                response,
                reason,
                report,
            } => {
                if let Some(report) = &report {
                    print_report(report);
                }
                match reason {
                    StopReason::Sentinel => {
                        println!("\nAI: (Final Answer)\n{}", response);
                    }
                    StopReason::AllTestsPassed => {
                        println!(
                            "\nAI: (Achieved 100% Success Rate - Final Answer)\n{}",
                            response
                        );
                    }
                    StopReason::BudgetExhausted => {
                        println!(
                            "\nAI: (Attempt budget exhausted - starting a fresh session)\n{}",
                            response
                        );
                    }
                }
            }
            TurnOutcome::Continue { response, report } => {
                if let Some(report) = &report {
                    print_report(report);
                }
                println!("\nAI:\n{}", response);
            }
            TurnOutcome::BackendError { message } => {
                eprintln!("\n{}", message);
            }
        }
    }

    let usage = controller.usage();
    if !cli.quiet && usage.total_calls > 0 {
        println!(
            "\nSession usage: {} calls, {} prompt tokens, {} completion tokens",
            usage.total_calls, usage.total_prompt_tokens, usage.total_completion_tokens
        );
    }
}
