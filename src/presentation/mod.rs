//! Template views and render helpers.

pub mod views;
