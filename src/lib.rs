//! hostsniff-core: pooled SSH transports driving remote packet-capture and log-tail workers.
//!
//! The library crate is shared by the foreground caller (which links the `front` module
//! directly) and the `hostsniff-supervisor` binary (which links `supervisor`); see SPEC_FULL.md
//! for the split rationale.

pub mod config;
pub mod error;
pub mod front;
pub mod ids;
pub mod ipc;
pub mod model;
pub mod pool;
pub mod supervisor;
pub mod worker;
