//! # Pin-Up Server
//!
//! Request/response surface over a Pin-Up vault.
//!
//! This crate provides:
//! - JSON request and response messages (`{"op": "...", ...}`)
//! - A dispatcher with admission control in front of every request
//! - A line-delimited JSON server for local tool bridges
//!
//! # Errors
//!
//! Failures are returned as `{"code", "message"}` with stable codes.
//! Internal failures never leak detail to the caller; it goes to the log.
//!
//! # Example
//!
//! ```rust,ignore
//! let server = PinupServer::open(vault_config, ServerConfig::default(), validator, clock)?;
//! let response = server.handle_json(r#"{"op": "search", "query": "tag:rust"}"#);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod protocol;
mod server;

pub use config::{ServerConfig, DEFAULT_CLIENT};
pub use error::{ApiError, ApiResult, INTERNAL_MESSAGE};
pub use handler::{HandlerContext, RequestHandler};
pub use protocol::{Envelope, Health, Reply, Request, Response, DEFAULT_LIMIT};
pub use server::PinupServer;
