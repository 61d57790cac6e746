//! Template views for the public site and the administrative surface.

pub mod admin;
pub mod views;
