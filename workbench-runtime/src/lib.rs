//! Core runtime for the Stylus workbench backend.
//!
//! This crate provides the compile/deploy pipeline (per-session project
//! workspaces, the `cargo stylus` invoker, diagnostic/output parsing) and
//! the blockchain-explorer contract loader, plus the axum router that
//! exposes them as a service.

pub mod abi;
pub mod api;
pub mod api_types;
pub mod config;
pub mod deploy;
pub mod error;
pub mod explorer;
pub mod http;
pub mod output;
pub mod progress;
pub mod source_host;
mod templates;
pub mod toolchain;
pub mod util;
pub mod workspace;

pub use config::WorkbenchConfig;
pub use error::WorkbenchError;
pub use toolchain::{ExecutionResult, OutputChunk, StreamKind};

pub const DEFAULT_WORKSPACE_DIR: &str = ".stylus-temp";
pub const DEFAULT_COMPILE_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_DEPLOY_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_EXPORT_TIMEOUT_SECS: u64 = 55;
pub const DEFAULT_SWEEP_MAX_AGE_MINUTES: u64 = 30;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
