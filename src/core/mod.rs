//! The core module holds the error type and the settings used to configure an execution engine.

pub mod app_info;
pub mod error;
