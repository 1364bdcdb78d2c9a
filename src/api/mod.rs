//! API module
//!
//! This module provides the API functionality for the sprig tool,
//! including the server, client, and request/response types.

pub mod client;
pub mod server;

// Re-export commonly used types
pub use client::{Client, ClientConfig, ClientError, TreeClient};
pub use server::{router, serve, ServerConfig, TaskCreated};
