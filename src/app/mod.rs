//! Application root: configuration, stores and services wired together.

#[allow(clippy::module_inception)]
mod app;

pub use app::{App, AppContext, AppError, Result};
