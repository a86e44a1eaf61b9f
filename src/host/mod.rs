//! Host environment
//!
//! A single event loop thread that runs observer handlers one at a time,
//! plus the tokio runtime that drives sockets.

mod builder;
mod client;
mod engine;

pub use builder::HostBuilder;
pub use client::HostClient;
pub use engine::Host;
