use once_cell::sync::OnceCell;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::{
    DEFAULT_COMPILE_TIMEOUT_SECS, DEFAULT_DEPLOY_TIMEOUT_SECS, DEFAULT_EXPORT_TIMEOUT_SECS,
    DEFAULT_SWEEP_MAX_AGE_MINUTES, DEFAULT_WORKSPACE_DIR,
};

/// Runtime configuration loaded once at startup from environment variables.
#[derive(Clone, Debug)]
pub struct WorkbenchConfig {
    /// Root directory under which per-session workspaces are created.
    pub workspace_root: PathBuf,
    /// Cargo executable used to invoke the `stylus` subcommands.
    pub cargo_bin: String,
    pub compile_timeout: Duration,
    pub deploy_timeout: Duration,
    pub export_timeout: Duration,
    pub sweep_interval: Duration,
    pub sweep_max_age_minutes: u64,
    /// Gas price cap passed to `cargo stylus deploy`.
    pub max_fee_per_gas_gwei: String,
    /// Etherscan V2 API key shared by all supported explorer hosts.
    pub explorer_api_key: Option<String>,
    /// Optional token for the source-hosting API (raises rate limits).
    pub source_host_token: Option<String>,
}

static CONFIG: OnceCell<WorkbenchConfig> = OnceCell::new();

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

impl WorkbenchConfig {
    /// Load configuration from environment variables.
    /// Cached after the first call; subsequent calls return the same config.
    pub fn load() -> &'static WorkbenchConfig {
        CONFIG.get_or_init(|| {
            let workspace_root = env::var("WORKBENCH_WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    env::current_dir()
                        .unwrap_or_else(|_| env::temp_dir())
                        .join(DEFAULT_WORKSPACE_DIR)
                });
            let cargo_bin =
                env::var("WORKBENCH_CARGO_BIN").unwrap_or_else(|_| "cargo".to_string());
            let compile_timeout = Duration::from_secs(env_u64(
                "WORKBENCH_COMPILE_TIMEOUT_SECS",
                DEFAULT_COMPILE_TIMEOUT_SECS,
            ));
            let deploy_timeout = Duration::from_secs(env_u64(
                "WORKBENCH_DEPLOY_TIMEOUT_SECS",
                DEFAULT_DEPLOY_TIMEOUT_SECS,
            ));
            let export_timeout = Duration::from_secs(env_u64(
                "WORKBENCH_EXPORT_TIMEOUT_SECS",
                DEFAULT_EXPORT_TIMEOUT_SECS,
            ));
            let sweep_interval =
                Duration::from_secs(env_u64("WORKBENCH_SWEEP_INTERVAL_SECS", 300));
            let sweep_max_age_minutes = env_u64(
                "WORKBENCH_SWEEP_MAX_AGE_MINUTES",
                DEFAULT_SWEEP_MAX_AGE_MINUTES,
            );
            let max_fee_per_gas_gwei =
                env::var("WORKBENCH_MAX_FEE_PER_GAS_GWEI").unwrap_or_else(|_| "0.5".to_string());
            let explorer_api_key = env::var("ETHERSCAN_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty());
            let source_host_token = env::var("GITHUB_TOKEN")
                .ok()
                .filter(|v| !v.trim().is_empty());

            WorkbenchConfig {
                workspace_root,
                cargo_bin,
                compile_timeout,
                deploy_timeout,
                export_timeout,
                sweep_interval,
                sweep_max_age_minutes,
                max_fee_per_gas_gwei,
                explorer_api_key,
                source_host_token,
            }
        })
    }
}
