//! Render orchestration: sessions, the render pass, chunk rewriting and the
//! controller that ties them to an HTTP response.

pub mod controller;
pub mod deadline;
pub mod error;
pub mod pass;
pub mod rewrite;
pub mod session;
