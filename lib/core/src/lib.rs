//! Core types and utilities for the launchgate LTI launch provider.
//!
//! This crate provides the foundational identifiers and the error-handling
//! alias shared by the provider library and the HTTP server.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, PlatformId};
