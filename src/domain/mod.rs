//! Domain layer: render-session state and the render tree seam.

pub mod assets;
pub mod error;
pub mod fragment;
pub mod styles;
pub mod suspense;
pub mod view;
