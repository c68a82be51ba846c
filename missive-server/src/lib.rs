//! Missive API server
//!
//! A read-only GraphQL API over users and their messages:
//! - a static schema registry with tagged resolvers
//! - a planner validating selections against it
//! - an executor forwarding projections to an entity store
//! - in-memory and SeaORM entity stores
//! - the axum HTTP surface

pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod plan;
pub mod response;
pub mod schema;
pub mod store;

pub use config::ServerConfig;
pub use error::{ConfigError, ExecutionError, StoreError};
pub use executor::Executor;
pub use http::{router, serve};
pub use response::{GraphQLError, PathSegment, Request, Response};
pub use store::{EntityStore, MemoryStore, Projection, Record, SeaOrmStore};
