//! Axum service boundary for the workbench.
//!
//! Every handler is a thin shell: parse the body, call into the domain
//! modules, map the result. Domain errors carry their own HTTP status
//! (validation 400, missing workspace 404, toolchain unavailable 503,
//! the rest 500). A compile that ran but failed is a 200 with
//! `success: false`; the diagnostics are the payload, not an error.

use axum::{
    Json, Router,
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::api_types::{
    CleanupResponse, CompileRequest, CompileResponse, ContractQuery, DeployRequest,
    DeployResponse, ExportAbiRequest, ExportAbiResponse, ImportRequest, ImportResponse,
};
use crate::config::WorkbenchConfig;
use crate::deploy;
use crate::error::{Result, WorkbenchError};
use crate::explorer;
use crate::output::{format_cargo_output, parse_compilation_errors, strip_ansi};
use crate::source_host::SourceHostClient;
use crate::toolchain;
use crate::workspace::{self, SessionGuard};

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ApiError {
    success: bool,
    error: String,
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            success: false,
            error: msg.into(),
        }),
    )
}

fn error_response(err: WorkbenchError) -> Response {
    let (status, msg) = match err {
        WorkbenchError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        WorkbenchError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        WorkbenchError::Toolchain(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    };
    api_error(status, msg).into_response()
}

/// Session ids are server-issued UUIDs; anything else in a request is
/// either a typo or an attempt to address outside the workspace root.
fn validate_session_id(session_id: &str) -> Result<()> {
    Uuid::parse_str(session_id)
        .map(|_| ())
        .map_err(|_| WorkbenchError::Validation("Invalid session id".into()))
}

// ---------------------------------------------------------------------------
// Compile
// ---------------------------------------------------------------------------

async fn run_compile(session_id: &str, req: CompileRequest) -> Result<CompileResponse> {
    let mut guard = SessionGuard::begin(session_id);

    let project = match (&req.project_files, &req.code) {
        (Some(files), _) if !files.is_empty() => workspace::create_multi(session_id, files).await?,
        (_, Some(code)) if !code.trim().is_empty() => workspace::create(session_id, code).await?,
        _ => {
            return Err(WorkbenchError::Validation(
                "Request must include `code` or a non-empty `project_files` list".into(),
            ));
        }
    };

    let result = toolchain::check(&project).await?;
    // The workspace outlives the request once the toolchain has run
    // against it: deploy and ABI export address it by session id.
    guard.keep();

    let stderr = strip_ansi(&result.stderr());
    let errors = if result.success {
        Vec::new()
    } else {
        parse_compilation_errors(&stderr)
    };
    info!(
        "compile {session_id}: exit {} ({} diagnostics)",
        result.exit_code,
        errors.len()
    );

    Ok(CompileResponse {
        success: result.success,
        exit_code: result.exit_code,
        timed_out: result.timed_out,
        output: format_cargo_output(&strip_ansi(&result.combined())),
        errors,
        session_id: session_id.to_string(),
    })
}

async fn compile(Json(req): Json<CompileRequest>) -> Response {
    let session_id = Uuid::new_v4().to_string();
    match run_compile(&session_id, req).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => error_response(err),
    }
}

// ---------------------------------------------------------------------------
// Deploy
// ---------------------------------------------------------------------------

async fn run_deploy(req: DeployRequest) -> Result<DeployResponse> {
    validate_session_id(&req.session_id)?;
    if !workspace::exists(&req.session_id).await {
        return Err(WorkbenchError::NotFound(
            "Project not found. Please compile your contract first.".into(),
        ));
    }
    let private_key = deploy::normalize_private_key(&req.private_key)?;

    let mut guard = SessionGuard::begin(&req.session_id);
    guard.keep();

    let project = workspace::workspace_path(&req.session_id);
    let result = deploy::deploy_contract(&project, &private_key, &req.rpc_url).await?;

    let tx_hash = result
        .activation_tx_hash
        .clone()
        .or_else(|| result.deployment_tx_hash.clone());
    let output = strip_ansi(
        &result
            .output
            .iter()
            .map(|chunk| chunk.data.as_str())
            .collect::<String>(),
    );

    Ok(DeployResponse {
        success: result.success,
        contract_address: result.contract_address,
        deployment_tx_hash: result.deployment_tx_hash,
        activation_tx_hash: result.activation_tx_hash,
        tx_hash,
        rpc_used: result.rpc_used,
        error: result.error,
        output,
    })
}

async fn deploy(Json(req): Json<DeployRequest>) -> Response {
    match run_deploy(req).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => error_response(err),
    }
}

// ---------------------------------------------------------------------------
// ABI export
// ---------------------------------------------------------------------------

async fn run_export_abi(req: ExportAbiRequest) -> Result<ExportAbiResponse> {
    validate_session_id(&req.session_id)?;
    if !workspace::exists(&req.session_id).await {
        return Err(WorkbenchError::NotFound(
            "Project not found. Please compile your contract first.".into(),
        ));
    }

    let mut guard = SessionGuard::begin(&req.session_id);
    guard.keep();

    let project = workspace::workspace_path(&req.session_id);
    let solidity_run = toolchain::export_abi(&project, false).await?;
    if !solidity_run.success {
        return Ok(ExportAbiResponse {
            success: false,
            solidity: None,
            abi: None,
            error: Some("ABI export failed".into()),
            details: Some(strip_ansi(&solidity_run.stderr())),
        });
    }
    let json_run = toolchain::export_abi(&project, true).await?;

    Ok(ExportAbiResponse {
        success: true,
        solidity: Some(strip_ansi(&solidity_run.stdout())),
        abi: json_run
            .success
            .then(|| strip_ansi(&json_run.stdout())),
        error: None,
        details: None,
    })
}

async fn export_abi(Json(req): Json<ExportAbiRequest>) -> Response {
    match run_export_abi(req).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => error_response(err),
    }
}

// ---------------------------------------------------------------------------
// Cleanup
// ---------------------------------------------------------------------------

async fn cleanup() -> Response {
    let max_age = WorkbenchConfig::load().sweep_max_age_minutes;
    match tokio::task::spawn_blocking(move || workspace::sweep(max_age)).await {
        Ok(removed) => (
            StatusCode::OK,
            Json(CleanupResponse {
                success: true,
                removed,
            }),
        )
            .into_response(),
        Err(err) => error_response(WorkbenchError::Internal(format!("sweep task failed: {err}"))),
    }
}

// ---------------------------------------------------------------------------
// Setup check
// ---------------------------------------------------------------------------

async fn check_setup() -> Response {
    (StatusCode::OK, Json(toolchain::check_setup().await)).into_response()
}

// ---------------------------------------------------------------------------
// Explorer lookups
// ---------------------------------------------------------------------------

async fn list_explorers() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "explorers": explorer::supported_explorers() })),
    )
        .into_response()
}

async fn load_contract(Query(query): Query<ContractQuery>) -> Response {
    match explorer::fetch_contract_for_interaction(&query.domain, &query.address, |_| {}).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(err) => error_response(err),
    }
}

// ---------------------------------------------------------------------------
// Project import
// ---------------------------------------------------------------------------

async fn run_import(req: ImportRequest) -> Result<ImportResponse> {
    let client = SourceHostClient::new();
    let files = client
        .import_project(&req.owner, &req.repo, req.branch.as_deref(), |_| {})
        .await?;

    let session_id = Uuid::new_v4().to_string();
    let mut guard = SessionGuard::begin(&session_id);
    workspace::create_multi(&session_id, &files).await?;
    guard.keep();
    info!(
        "import {session_id}: {} files from {}/{}",
        files.len(),
        req.owner,
        req.repo
    );

    Ok(ImportResponse {
        success: true,
        session_id,
        files,
    })
}

async fn import_project(Json(req): Json<ImportRequest>) -> Response {
    match run_import(req).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => error_response(err),
    }
}

// ---------------------------------------------------------------------------
// Router builder
// ---------------------------------------------------------------------------

/// Build the workbench API router with all endpoints and CORS support.
pub fn api_router() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Compile/deploy pipeline
        .route("/api/compile", post(compile))
        .route("/api/deploy", post(deploy))
        .route("/api/export-abi", post(export_abi))
        .route("/api/cleanup", post(cleanup))
        .route("/api/check-setup", get(check_setup))
        // Contract loading
        .route("/api/explorers", get(list_explorers))
        .route("/api/contract", get(load_contract))
        .route("/api/import", post(import_project))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
