//! # reforge-error
//!
//! Unified error handling for reforge - following OpenDAL's error handling practices.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what error occurred (e.g., BackendFailed, ExecutionTimeout)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary, Persistent)
//! - **Error Context**: Assist in locating the cause with rich context
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use reforge_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::BackendFailed, "model returned empty response")
//!         .with_operation("provider::complete")
//!         .with_context("model", "qwen-2.5-coder-32b")
//!         .with_context("messages", "6"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All functions return `Result<T, reforge_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context
//! - Don't abuse `From<OtherError>` to prevent raw error leakage

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using reforge Error
pub type Result<T> = std::result::Result<T, Error>;
