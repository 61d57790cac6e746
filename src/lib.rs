//! Verbalize publishing engine.
//!
//! Stores timestamped entries and an ordered list of links, renders them through
//! compiled templates and serves the result over HTTP behind a read-through page
//! cache that is flushed on every content write.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
pub mod util;
