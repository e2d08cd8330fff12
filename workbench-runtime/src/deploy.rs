//! Deployment orchestration: one `cargo stylus deploy` run plus
//! extraction of the address and transaction hashes from its output.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, WorkbenchError};
use crate::output::{extract_deploy_info, strip_ansi};
use crate::toolchain::{self, ExecutionResult, OutputChunk};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub success: bool,
    pub contract_address: Option<String>,
    pub deployment_tx_hash: Option<String>,
    pub activation_tx_hash: Option<String>,
    pub rpc_used: String,
    pub error: Option<String>,
    pub output: Vec<OutputChunk>,
}

/// Validate and canonicalize a hex private key to `0x` + 64 hex chars.
pub fn normalize_private_key(key: &str) -> Result<String> {
    let compact: String = key.chars().filter(|c| !c.is_whitespace()).collect();
    let without_prefix = compact
        .strip_prefix("0x")
        .or_else(|| compact.strip_prefix("0X"))
        .unwrap_or(&compact);

    let bytes = hex::decode(without_prefix).map_err(|_| {
        WorkbenchError::Validation(
            "Private key contains invalid characters. Must be hexadecimal (0-9, a-f).".into(),
        )
    })?;
    if bytes.len() != 32 {
        return Err(WorkbenchError::Validation(format!(
            "Private key must be exactly 64 hex characters (got {}).",
            without_prefix.len()
        )));
    }

    Ok(format!("0x{without_prefix}"))
}

/// Deploy the compiled workspace at `project` to `rpc_url`.
///
/// Never reports success without a contract address. The toolchain
/// occasionally exits nonzero after a completed deployment; when an
/// address is present the result is still a success, with the exit code
/// noted in `error`.
pub async fn deploy_contract(
    project: &Path,
    private_key: &str,
    rpc_url: &str,
) -> Result<DeploymentResult> {
    let result = toolchain::deploy(project, private_key, rpc_url).await?;
    Ok(interpret_execution(result, rpc_url))
}

/// Turn a finished toolchain run into a [`DeploymentResult`].
fn interpret_execution(result: ExecutionResult, rpc_url: &str) -> DeploymentResult {
    if result.timed_out {
        return DeploymentResult {
            success: false,
            contract_address: None,
            deployment_tx_hash: None,
            activation_tx_hash: None,
            rpc_used: rpc_url.to_string(),
            error: Some("Deployment timed out".into()),
            output: result.output,
        };
    }

    let info = extract_deploy_info(&result.combined());

    if let Some(address) = info.contract_address {
        let error = if result.exit_code == 0 {
            None
        } else {
            Some(format!(
                "Non-zero exit code {}, but contract address was found.",
                result.exit_code
            ))
        };
        return DeploymentResult {
            success: true,
            contract_address: Some(address),
            deployment_tx_hash: info.deployment_tx_hash,
            activation_tx_hash: info.activation_tx_hash,
            rpc_used: rpc_url.to_string(),
            error,
            output: result.output,
        };
    }

    let stderr = strip_ansi(&result.stderr());
    DeploymentResult {
        success: false,
        contract_address: None,
        deployment_tx_hash: None,
        activation_tx_hash: None,
        rpc_used: rpc_url.to_string(),
        error: Some(if stderr.trim().is_empty() {
            "Deployment failed".into()
        } else {
            stderr
        }),
        output: result.output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "a665a45920422f9d417e4867efdc4fb8a04a1f3fff1fa07e998e86f7f7a27ae3";

    #[test]
    fn normalizes_key_variants_to_prefixed_form() {
        let expected = format!("0x{KEY}");
        assert_eq!(normalize_private_key(KEY).unwrap(), expected);
        assert_eq!(normalize_private_key(&expected).unwrap(), expected);
        assert_eq!(
            normalize_private_key(&format!("  0X{KEY}\n")).unwrap(),
            expected
        );
    }

    async fn run_script(script: &str) -> ExecutionResult {
        let dir = tempfile::tempdir().unwrap();
        toolchain::run(
            dir.path(),
            "sh",
            &["-c", script],
            &[],
            std::time::Duration::from_secs(5),
        )
        .await
        .unwrap()
    }

    const RPC: &str = "http://localhost:8547";

    #[tokio::test]
    async fn nonzero_exit_with_address_is_still_a_success() {
        let result = run_script(
            "echo 'deployed code at address: 0x33f54de59419570a9442e788f5dd5cf635b3c7ac'; exit 2",
        )
        .await;
        let deployment = interpret_execution(result, RPC);

        assert!(deployment.success);
        assert_eq!(
            deployment.contract_address.as_deref(),
            Some("0x33f54de59419570a9442e788f5dd5cf635b3c7ac")
        );
        assert!(deployment.error.as_deref().unwrap().contains("exit code 2"));
        assert_eq!(deployment.rpc_used, RPC);
    }

    #[tokio::test]
    async fn clean_exit_with_address_carries_no_error() {
        let result = run_script(
            "echo 'deployed code at address: 0x33f54de59419570a9442e788f5dd5cf635b3c7ac'",
        )
        .await;
        let deployment = interpret_execution(result, RPC);

        assert!(deployment.success);
        assert!(deployment.contract_address.is_some());
        assert_eq!(deployment.error, None);
    }

    #[tokio::test]
    async fn missing_address_is_a_failure_with_stderr_as_error() {
        let result = run_script("echo 'insufficient funds' >&2; exit 1").await;
        let deployment = interpret_execution(result, RPC);

        assert!(!deployment.success);
        assert_eq!(deployment.contract_address, None);
        assert!(
            deployment
                .error
                .as_deref()
                .unwrap()
                .contains("insufficient funds")
        );
    }

    #[tokio::test]
    async fn timed_out_run_is_reported_as_such() {
        let dir = tempfile::tempdir().unwrap();
        let result = toolchain::run(
            dir.path(),
            "sh",
            &["-c", "sleep 30"],
            &[],
            std::time::Duration::from_millis(200),
        )
        .await
        .unwrap();
        let deployment = interpret_execution(result, RPC);

        assert!(!deployment.success);
        assert_eq!(deployment.error.as_deref(), Some("Deployment timed out"));
    }

    #[test]
    fn rejects_bad_keys() {
        assert!(matches!(
            normalize_private_key("0xzz"),
            Err(WorkbenchError::Validation(_))
        ));
        assert!(matches!(
            normalize_private_key("0xabcd"),
            Err(WorkbenchError::Validation(_))
        ));
        assert!(matches!(
            normalize_private_key(""),
            Err(WorkbenchError::Validation(_))
        ));
    }
}
