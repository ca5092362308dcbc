//! # Reforge Agent
//!
//! The session controller orchestrates the refinement loop:
//! 1. User provides a task or a correction
//! 2. LLM generates a response, possibly with one fenced code block
//! 3. The harness executes the block and scores self-reported tests
//! 4. The tracker keeps the best and last-failed attempts as context
//! 5. Multi-attempt until a sentinel, a 100% score, or the budget runs out
//!
//! The LLM proposes, the harness disposes.

mod controller;

pub use controller::{
    AgentConfig, ExecutionReport, SessionController, StopReason, TurnOutcome,
};
