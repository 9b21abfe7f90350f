//! Streaming server-side HTML renderer that splices collected CSS into the
//! flushed byte stream.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
mod util;
