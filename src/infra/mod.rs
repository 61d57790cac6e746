//! Infrastructure adapters and runtime bootstrap.

pub mod app;
pub mod db;
pub mod error;
pub mod fetch;
pub mod http;
pub mod memory;
pub mod telemetry;
