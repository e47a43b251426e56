//! # HTTP API
//!
//! A thin, hand-rolled hyper transport over `orchestrator-core` and
//! `orchestrator-scheduler`: no framework, five endpoints, JSON in and out.

pub mod dto;
pub mod handler;
pub mod server;

pub use handler::AppState;
pub use server::serve;
