//! Ambient plumbing shared by Herald services: configuration loading,
//! tracing setup, health endpoints, HTTP middleware and serde helpers.

pub mod config;
pub mod health;
pub mod middleware;
pub mod serde;
pub mod tracing;
