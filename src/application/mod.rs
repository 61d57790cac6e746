//! Application services: queries, rendering, writes and their error mapping.

pub mod content;
pub mod error;
pub mod pagination;
pub mod query;
pub mod repos;
pub mod site;
pub mod snippet;
pub mod template_fns;
