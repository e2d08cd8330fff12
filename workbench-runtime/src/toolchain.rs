//! Subprocess invoker for the `cargo stylus` toolchain.
//!
//! One external process per request, working directory pinned to the
//! session workspace. Stdout and stderr are captured as they arrive into
//! a single ordered chunk sequence; ordering across the two streams is
//! best-effort. Credentials travel only in the argument list and are
//! never logged.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::WorkbenchConfig;
use crate::error::{Result, WorkbenchError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// One captured chunk of subprocess output, in arrival order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputChunk {
    pub stream: StreamKind,
    pub data: String,
    /// Milliseconds since the process was spawned.
    pub at_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub success: bool,
    pub output: Vec<OutputChunk>,
    pub timed_out: bool,
}

impl ExecutionResult {
    pub fn stdout(&self) -> String {
        self.collect(StreamKind::Stdout)
    }

    pub fn stderr(&self) -> String {
        self.collect(StreamKind::Stderr)
    }

    pub fn combined(&self) -> String {
        self.output
            .iter()
            .map(|c| c.data.as_str())
            .collect::<Vec<_>>()
            .join("")
    }

    fn collect(&self, stream: StreamKind) -> String {
        self.output
            .iter()
            .filter(|c| c.stream == stream)
            .map(|c| c.data.as_str())
            .collect()
    }
}

fn spawn_reader(
    mut source: impl AsyncReadExt + Unpin + Send + 'static,
    stream: StreamKind,
    started: Instant,
    tx: mpsc::UnboundedSender<OutputChunk>,
) {
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match source.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let chunk = OutputChunk {
                        stream,
                        data: String::from_utf8_lossy(&buf[..n]).into_owned(),
                        at_ms: started.elapsed().as_millis() as u64,
                    };
                    if tx.send(chunk).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Launch `program args…` in `dir` and capture its output until exit or
/// until `timeout` elapses, in which case the process is killed and the
/// result is flagged `timed_out`. A spawn failure (executable missing)
/// is a [`WorkbenchError::Toolchain`]: infrastructure, not a build
/// failure.
pub async fn run(
    dir: &Path,
    program: &str,
    args: &[&str],
    envs: &[(&str, &str)],
    timeout: Duration,
) -> Result<ExecutionResult> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(dir)
        .env("CARGO_TERM_COLOR", "never")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in envs {
        cmd.env(key, value);
    }

    let started = Instant::now();
    let mut child = cmd.spawn().map_err(|err| {
        WorkbenchError::Toolchain(format!("failed to launch {program}: {err}"))
    })?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    if let Some(stdout) = child.stdout.take() {
        spawn_reader(stdout, StreamKind::Stdout, started, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_reader(stderr, StreamKind::Stderr, started, tx.clone());
    }
    drop(tx);

    let (exit_code, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => {
            let status = status?;
            (status.code().unwrap_or(-1), false)
        }
        Err(_) => {
            debug!("{program} exceeded {}s, killing", timeout.as_secs());
            let _ = child.kill().await;
            (-1, true)
        }
    };

    // Readers close the channel once both pipes hit EOF.
    let mut output = Vec::new();
    while let Some(chunk) = rx.recv().await {
        output.push(chunk);
    }

    Ok(ExecutionResult {
        exit_code,
        success: !timed_out && exit_code == 0,
        output,
        timed_out,
    })
}

/// `cargo stylus check` against a session workspace.
pub async fn check(project: &Path) -> Result<ExecutionResult> {
    let config = WorkbenchConfig::load();
    run(
        project,
        &config.cargo_bin,
        &["stylus", "check"],
        &[],
        config.compile_timeout,
    )
    .await
}

/// `cargo stylus deploy` against a session workspace. The private key is
/// passed only through the argument list.
pub async fn deploy(project: &Path, private_key: &str, rpc_url: &str) -> Result<ExecutionResult> {
    let config = WorkbenchConfig::load();
    run(
        project,
        &config.cargo_bin,
        &[
            "stylus",
            "deploy",
            "--private-key",
            private_key,
            "--endpoint",
            rpc_url,
            "--no-verify",
            "--max-fee-per-gas-gwei",
            &config.max_fee_per_gas_gwei,
        ],
        &[("RUST_LOG", "info")],
        config.deploy_timeout,
    )
    .await
}

/// `cargo stylus export-abi`, optionally in JSON form.
pub async fn export_abi(project: &Path, json: bool) -> Result<ExecutionResult> {
    let config = WorkbenchConfig::load();
    let mut args = vec!["stylus", "export-abi"];
    if json {
        args.push("--json");
    }
    args.push("--rust-features=export-abi");
    run(project, &config.cargo_bin, &args, &[], config.export_timeout).await
}

const SETUP_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// `rustc 1.88.0 (abc 2025-06-01)` and the like.
static RUSTC_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"rustc (\d+)\.(\d+)\.(\d+)").expect("rustc version regex"));

/// Minimum rustc the Stylus toolchain works well with.
const MIN_RUST: (u32, u32) = (1, 88);

/// Presence and versions of everything a compile needs on this host.
#[derive(Clone, Debug, Serialize)]
pub struct SetupStatus {
    pub rust: bool,
    pub cargo: bool,
    pub wasm_target: bool,
    pub cargo_stylus: bool,
    pub platform: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rust_version: Option<String>,
    pub needs_update: bool,
}

async fn tool_check(program: &str, args: &[&str]) -> Option<ExecutionResult> {
    let dir = std::env::temp_dir();
    run(&dir, program, args, &[], SETUP_CHECK_TIMEOUT)
        .await
        .ok()
        .filter(|result| result.success)
}

fn parse_rustc_version(stdout: &str) -> Option<(u32, u32, u32)> {
    let caps = RUSTC_VERSION_RE.captures(stdout)?;
    Some((
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    ))
}

fn version_needs_update(major: u32, minor: u32) -> bool {
    major < MIN_RUST.0 || (major == MIN_RUST.0 && minor < MIN_RUST.1)
}

/// Probe the host for rustc, cargo, the wasm32 target, and the
/// `cargo stylus` subcommand. Checks never fail; an absent tool is a
/// `false` flag.
pub async fn check_setup() -> SetupStatus {
    let config = WorkbenchConfig::load();

    let rustc = tool_check("rustc", &["--version"]).await;
    let cargo = tool_check(&config.cargo_bin, &["--version"]).await.is_some();
    let wasm_target = tool_check("rustup", &["target", "list"])
        .await
        .map(|result| result.stdout().contains("wasm32-unknown-unknown (installed)"))
        .unwrap_or(false);
    let cargo_stylus = tool_check(&config.cargo_bin, &["stylus", "--version"])
        .await
        .is_some();

    let version = rustc
        .as_ref()
        .and_then(|result| parse_rustc_version(&result.stdout()));
    let needs_update = version
        .map(|(major, minor, _)| version_needs_update(major, minor))
        .unwrap_or(false);

    SetupStatus {
        rust: rustc.is_some(),
        cargo,
        wasm_target,
        cargo_stylus,
        platform: match std::env::consts::OS {
            os @ ("linux" | "macos" | "windows") => os,
            _ => "other",
        },
        rust_version: version.map(|(major, minor, patch)| format!("{major}.{minor}.{patch}")),
        needs_update,
    }
}
