//! Error types for the Mira completion service.
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - Constructors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use mira_error::{MiraResult, ServerError, ServerErrorKind};
//!
//! fn respond() -> MiraResult<String> {
//!     Err(ServerError::new(ServerErrorKind::Timeout))?
//! }
//!
//! match respond() {
//!     Ok(body) => println!("Got: {}", body),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod server;

pub use config::ConfigError;
pub use error::{MiraError, MiraErrorKind, MiraResult};
pub use server::{ServerError, ServerErrorKind};
