//! # Pin-Up Testkit
//!
//! Test utilities for the Pin-Up vault.
//!
//! This crate provides:
//! - Test fixtures with temporary data directories
//! - Property-based test generators using proptest
//! - Integration helpers that track a model of the vault
//! - Concurrent stress helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pinup_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_vault() {
//!     with_temp_vault(|vault| {
//!         vault.create_snippet(NewSnippet::new("hello")).unwrap();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
    pub use pinup_core::{NewSnippet, SearchOptions, SnippetFilter, Vault};
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
