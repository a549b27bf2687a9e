//! launchgate web server.
//!
//! This crate provides the axum HTTP surface for the launchgate LTI 1.3
//! launch provider: the gatekeeper middleware, the login route, the launch
//! hooks and the PostgreSQL stores.

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
