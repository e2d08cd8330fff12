//! Request and response bodies for the workbench API.

use serde::{Deserialize, Serialize};

use crate::output::CompilationError;
pub use crate::workspace::ProjectFile;

/// A compile submission: either a single `code` body that becomes
/// `src/lib.rs`, or a full `project_files` listing. `project_files`
/// wins when both are present.
#[derive(Debug, Deserialize)]
pub struct CompileRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub project_files: Option<Vec<ProjectFile>>,
}

#[derive(Debug, Serialize)]
pub struct CompileResponse {
    pub success: bool,
    pub exit_code: i32,
    pub timed_out: bool,
    pub output: String,
    pub errors: Vec<CompilationError>,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DeployRequest {
    pub session_id: String,
    pub private_key: String,
    pub rpc_url: String,
}

/// `tx_hash` is a presentation convenience: the activation hash when
/// the contract needed activation, otherwise the deployment hash.
#[derive(Debug, Serialize)]
pub struct DeployResponse {
    pub success: bool,
    pub contract_address: Option<String>,
    pub deployment_tx_hash: Option<String>,
    pub activation_tx_hash: Option<String>,
    pub tx_hash: Option<String>,
    pub rpc_used: String,
    pub error: Option<String>,
    pub output: String,
}

#[derive(Debug, Deserialize)]
pub struct ExportAbiRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ExportAbiResponse {
    pub success: bool,
    pub solidity: Option<String>,
    pub abi: Option<String>,
    pub error: Option<String>,
    pub details: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub success: bool,
    pub removed: usize,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub session_id: String,
    pub files: Vec<ProjectFile>,
}

#[derive(Debug, Deserialize)]
pub struct ContractQuery {
    pub domain: String,
    pub address: String,
}
