//! Presentation layer: the demo UI tree and askama views.

pub mod app;
pub mod views;
