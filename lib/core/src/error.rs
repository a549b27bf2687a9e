//! Shared result alias for launchgate crates.
//!
//! Collaborator contracts (platform registry, replay stores, token
//! validators) return `Result<T, E>` where `E` is the crate-local error enum.
//! Callers layer their own context onto the report with `.context()` when a
//! store failure becomes a launch or login failure.

use rootcause::Report;

/// Result carrying a rootcause [`Report`] whose current context is `C`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
