//! # casagent-error
//!
//! Unified error handling for casagent - following OpenDAL's error handling practices.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what error occurred (e.g., EngineMissing, TurnLimitExceeded)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary, Persistent)
//! - **Error Context**: Assist in locating the cause with rich context
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use casagent_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::ContainerCreateFailed, "podman run exited with status 125")
//!         .with_operation("session::launch")
//!         .with_context("container", "casa-agent-1a2b3c4d")
//!         .with_context("image", "casa-skeleton-python"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All fallible functions return `Result<T, casagent_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context
//! - Don't abuse `From<OtherError>` to prevent raw error leakage

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using casagent Error
pub type Result<T> = std::result::Result<T, Error>;
