//! Missive API client
//!
//! Fetches the users query through a keyed result cache and renders it:
//! - a transport trait with an HTTP implementation
//! - a per-key cache whose entries can be subscribed to
//! - a client that fetches each key at most once
//! - a pure render step from snapshot to list view

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod operation;
pub mod query;
pub mod render;
pub mod transport;

pub use cache::{QueryCache, QueryState, Snapshot};
pub use client::Client;
pub use config::ClientConfig;
pub use error::{ClientError, CombinedError, ConfigError, TransportError};
pub use operation::{Operation, OperationResult, ResponseBody};
pub use render::{View, render};
pub use transport::{HttpTransport, Transport};
