//! Blockchain-explorer contract loader.
//!
//! Fetches verified contract source and ABI from an Etherscan-style API
//! and reassembles the payload into a file list. The payload shape
//! (single file, multi-file JSON, flattened) is sniffed once at parse
//! time into a tagged [`SourceKind`]; nothing downstream re-inspects the
//! raw text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::abi::{self, ParsedFunction};
use crate::config::WorkbenchConfig;
use crate::error::{Result, WorkbenchError};
use crate::http::build_url;
use crate::progress::{LoadProgress, LoadStage};
use crate::util::http_client;

const ETHERSCAN_V2_BASE: &str = "https://api.etherscan.io/v2/api";

#[derive(Clone, Debug, Serialize)]
pub struct ExplorerConfig {
    pub name: &'static str,
    pub chain: &'static str,
    pub network: &'static str,
    pub chain_id: u64,
    pub api_url: &'static str,
    pub explorer_url: &'static str,
    pub api_key_required: bool,
}

/// Known explorer hosts. All Etherscan-family explorers share the V2
/// unified API base and are distinguished by `chainid`.
static EXPLORERS: &[(&str, ExplorerConfig)] = &[
    (
        "etherscan.io",
        ExplorerConfig {
            name: "Etherscan",
            chain: "ethereum",
            network: "mainnet",
            chain_id: 1,
            api_url: ETHERSCAN_V2_BASE,
            explorer_url: "https://etherscan.io",
            api_key_required: true,
        },
    ),
    (
        "sepolia.etherscan.io",
        ExplorerConfig {
            name: "Sepolia Etherscan",
            chain: "ethereum",
            network: "sepolia",
            chain_id: 11155111,
            api_url: ETHERSCAN_V2_BASE,
            explorer_url: "https://sepolia.etherscan.io",
            api_key_required: true,
        },
    ),
    (
        "arbiscan.io",
        ExplorerConfig {
            name: "Arbiscan",
            chain: "arbitrum",
            network: "mainnet",
            chain_id: 42161,
            api_url: ETHERSCAN_V2_BASE,
            explorer_url: "https://arbiscan.io",
            api_key_required: true,
        },
    ),
    (
        "sepolia.arbiscan.io",
        ExplorerConfig {
            name: "Arbiscan Sepolia",
            chain: "arbitrum",
            network: "sepolia",
            chain_id: 421614,
            api_url: ETHERSCAN_V2_BASE,
            explorer_url: "https://sepolia.arbiscan.io",
            api_key_required: true,
        },
    ),
    (
        "basescan.org",
        ExplorerConfig {
            name: "Basescan",
            chain: "base",
            network: "mainnet",
            chain_id: 8453,
            api_url: ETHERSCAN_V2_BASE,
            explorer_url: "https://basescan.org",
            api_key_required: true,
        },
    ),
];

pub fn get_explorer_config(domain: &str) -> Option<&'static ExplorerConfig> {
    EXPLORERS
        .iter()
        .find(|(host, _)| *host == domain)
        .map(|(_, config)| config)
}

pub fn supported_explorers() -> Vec<&'static ExplorerConfig> {
    EXPLORERS.iter().map(|(_, config)| config).collect()
}

static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("address regex"));

// ---------------------------------------------------------------------------
// API envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ExplorerEnvelope {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: serde_json::Value,
}

/// One `getsourcecode` result record, as returned by the explorer.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ContractSourceRecord {
    #[serde(rename = "SourceCode", default)]
    pub source_code: String,
    #[serde(rename = "ABI", default)]
    pub abi: String,
    #[serde(rename = "ContractName", default)]
    pub contract_name: String,
    #[serde(rename = "CompilerVersion", default)]
    pub compiler_version: String,
    #[serde(rename = "OptimizationUsed", default)]
    pub optimization_used: String,
}

/// Fetch the verified-source record for `address` from `api_base`.
///
/// `api_base` is split out from the config so tests can point at a local
/// server; production callers pass `config.api_url`.
pub async fn fetch_contract_record(
    config: &ExplorerConfig,
    api_base: &str,
    address: &str,
    api_key: Option<&str>,
) -> Result<ContractSourceRecord> {
    let mut url = build_url(api_base, "")?;
    url.query_pairs_mut()
        .append_pair("chainid", &config.chain_id.to_string())
        .append_pair("module", "contract")
        .append_pair("action", "getsourcecode")
        .append_pair("address", address);
    if let Some(key) = api_key {
        url.query_pairs_mut().append_pair("apikey", key);
    }

    debug!("explorer lookup: {} {address}", config.name);
    let response = http_client()?
        .get(url)
        .send()
        .await
        .map_err(|err| WorkbenchError::Http(format!("HTTP request failed: {err}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(WorkbenchError::Explorer(format!(
            "Failed to fetch from {}: HTTP {status}",
            config.name
        )));
    }
    let envelope: ExplorerEnvelope = response
        .json()
        .await
        .map_err(|err| WorkbenchError::Explorer(format!("Invalid explorer response: {err}")))?;

    if envelope.status != "1" {
        let result_text = envelope.result.as_str().unwrap_or_default();
        let combined = format!("{} {result_text}", envelope.message);
        let lowered = combined.to_lowercase();

        if lowered.contains("invalid api key") {
            return Err(WorkbenchError::Explorer(format!(
                "Invalid API key for {}",
                config.name
            )));
        }
        if envelope.message == "NOTOK" {
            return Err(WorkbenchError::Explorer(format!(
                "API request failed: {}",
                if result_text.is_empty() {
                    envelope.message.as_str()
                } else {
                    result_text
                }
            )));
        }
        return Err(WorkbenchError::Explorer(format!(
            "API error: {}",
            combined.trim()
        )));
    }

    let record_value = match &envelope.result {
        serde_json::Value::Array(items) => items.first().cloned(),
        value @ serde_json::Value::Object(_) => Some(value.clone()),
        _ => None,
    }
    .ok_or_else(|| WorkbenchError::Explorer("Invalid response from explorer API".into()))?;

    let record: ContractSourceRecord = serde_json::from_value(record_value)
        .map_err(|err| WorkbenchError::Explorer(format!("Malformed source record: {err}")))?;

    if record.source_code.is_empty() {
        return Err(WorkbenchError::Explorer(
            "Contract is not verified on this explorer".into(),
        ));
    }

    Ok(record)
}

// ---------------------------------------------------------------------------
// Source payload parsing
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Single,
    MultiFile,
    Flattened,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParsedContractSource {
    pub kind: SourceKind,
    pub files: Vec<SourceFile>,
    pub main_file: String,
}

fn file_from_entry(path: &str, value: &serde_json::Value) -> Option<SourceFile> {
    let content = match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(obj) => obj
            .get("content")
            .or_else(|| obj.get("source"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    };
    if content.is_empty() {
        return None;
    }
    Some(SourceFile {
        path: path.trim_start_matches('/').to_string(),
        content,
    })
}

fn try_parse_multi(raw: &str) -> Option<Vec<SourceFile>> {
    // Etherscan wraps standard-JSON input in doubled braces: {{…}}.
    let json_str = if raw.starts_with("{{") && raw.ends_with("}}") {
        &raw[1..raw.len() - 1]
    } else {
        raw
    };
    let parsed: serde_json::Value = serde_json::from_str(json_str).ok()?;
    let object = parsed.as_object()?;

    // Standard format: { "language": …, "sources": { path: {content} } }
    let files: Vec<SourceFile> = if let Some(sources) =
        object.get("sources").and_then(|s| s.as_object())
    {
        sources
            .iter()
            .filter_map(|(path, value)| file_from_entry(path, value))
            .collect()
    } else {
        // Legacy format: { "Contract.sol": {content}, … }
        object
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "language" | "settings"))
            .filter_map(|(path, value)| file_from_entry(path, value))
            .collect()
    };

    if files.is_empty() { None } else { Some(files) }
}

/// Classify and reassemble a raw verified-source payload.
pub fn parse_contract_source(raw: &str, contract_name: &str) -> Result<ParsedContractSource> {
    if raw.is_empty() {
        return Err(WorkbenchError::Explorer("Source code is empty".into()));
    }

    if raw.starts_with('{') {
        if let Some(files) = try_parse_multi(raw) {
            let main_file = files
                .iter()
                .map(|f| f.path.clone())
                .next()
                .unwrap_or_else(|| format!("{contract_name}.sol"));
            return Ok(ParsedContractSource {
                kind: SourceKind::MultiFile,
                files,
                main_file,
            });
        }
        debug!("payload looked like JSON but did not parse; treating as single file");
    }

    let kind = if raw.contains("// File:") {
        SourceKind::Flattened
    } else {
        SourceKind::Single
    };
    let file_name = format!("{contract_name}.sol");
    Ok(ParsedContractSource {
        kind,
        files: vec![SourceFile {
            path: file_name.clone(),
            content: raw.to_string(),
        }],
        main_file: file_name,
    })
}

// ---------------------------------------------------------------------------
// High-level loaders
// ---------------------------------------------------------------------------

fn resolve_explorer(domain: &str) -> Result<&'static ExplorerConfig> {
    get_explorer_config(domain).ok_or_else(|| {
        WorkbenchError::Explorer(format!("Unsupported blockchain explorer: {domain}"))
    })
}

fn require_api_key(config: &ExplorerConfig) -> Result<Option<String>> {
    let key = WorkbenchConfig::load().explorer_api_key.clone();
    if key.is_none() && config.api_key_required {
        return Err(WorkbenchError::Explorer(format!(
            "API key required for {}. Set ETHERSCAN_API_KEY.",
            config.name
        )));
    }
    Ok(key)
}

/// Fetch and reassemble the verified source for a contract. Fails with
/// an unsupported-explorer error before any network call when the
/// domain is unknown.
pub async fn fetch_source(domain: &str, address: &str) -> Result<ParsedContractSource> {
    let config = resolve_explorer(domain)?;
    let api_key = require_api_key(config)?;
    let record =
        fetch_contract_record(config, config.api_url, address, api_key.as_deref()).await?;
    parse_contract_source(&record.source_code, &record.contract_name)
}

/// Everything the interaction panel needs for a verified contract.
#[derive(Clone, Debug, Serialize)]
pub struct ContractInteractionData {
    pub address: String,
    pub name: String,
    pub chain: &'static str,
    pub network: &'static str,
    pub chain_id: u64,
    pub abi_json: String,
    pub functions: Vec<ParsedFunction>,
    pub verified: bool,
    pub compiler: String,
    pub optimization: bool,
    pub explorer_url: String,
}

/// Fetch a contract's ABI and metadata for interaction, reporting
/// progress through `on_progress` at each stage boundary. The callback
/// runs synchronously relative to each stage's completion.
pub async fn fetch_contract_for_interaction(
    domain: &str,
    address: &str,
    mut on_progress: impl FnMut(LoadProgress),
) -> Result<ContractInteractionData> {
    let run = async {
        on_progress(LoadProgress::new(
            LoadStage::Validating,
            "Validating contract address...",
        ));
        if !ADDRESS_RE.is_match(address) {
            return Err(WorkbenchError::Validation(
                "Invalid Ethereum address format".into(),
            ));
        }
        let config = resolve_explorer(domain)?;
        let api_key = require_api_key(config)?;

        on_progress(LoadProgress::new(
            LoadStage::Fetching,
            format!("Fetching contract from {}...", config.chain),
        ));
        let record =
            fetch_contract_record(config, config.api_url, address, api_key.as_deref()).await?;
        on_progress(
            LoadProgress::new(
                LoadStage::Fetching,
                format!("Found contract: {}", record.contract_name),
            )
            .with_contract(record.contract_name.clone()),
        );

        on_progress(LoadProgress::new(
            LoadStage::Parsing,
            "Extracting contract ABI...",
        ));
        if record.abi.is_empty() {
            return Err(WorkbenchError::Explorer("Contract ABI not available".into()));
        }
        let functions = abi::parse_abi(&record.abi)?;

        let data = ContractInteractionData {
            address: address.to_string(),
            name: record.contract_name.clone(),
            chain: config.chain,
            network: config.network,
            chain_id: config.chain_id,
            abi_json: record.abi,
            functions,
            verified: true,
            compiler: record.compiler_version,
            optimization: record.optimization_used == "1",
            explorer_url: format!("{}/address/{address}", config.explorer_url),
        };

        on_progress(
            LoadProgress::new(
                LoadStage::Complete,
                format!("Ready to interact with {}", data.name),
            )
            .with_contract(data.name.clone()),
        );
        Ok(data)
    };

    let outcome = run.await;
    match outcome {
        Ok(data) => Ok(data),
        Err(err) => {
            on_progress(LoadProgress::new(LoadStage::Failed, err.to_string()));
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn unknown_domain_has_no_config() {
        assert!(get_explorer_config("unknown.example").is_none());
        assert!(get_explorer_config("arbiscan.io").is_some());
        assert_eq!(supported_explorers().len(), 5);
    }

    #[tokio::test]
    async fn unsupported_explorer_fails_before_any_network_call() {
        let err = fetch_source("unknown.example", "0x0000000000000000000000000000000000000000")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkbenchError::Explorer(_)));
        assert!(err.to_string().contains("Unsupported blockchain explorer"));
    }

    #[test]
    fn single_file_payload() {
        let parsed = parse_contract_source("contract Counter {}", "Counter").unwrap();
        assert_eq!(parsed.kind, SourceKind::Single);
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.main_file, "Counter.sol");
    }

    #[test]
    fn flattened_payload_is_detected_by_file_markers() {
        let raw = "// File: contracts/A.sol\ncontract A {}\n// File: contracts/B.sol\ncontract B {}";
        let parsed = parse_contract_source(raw, "Flat").unwrap();
        assert_eq!(parsed.kind, SourceKind::Flattened);
        assert_eq!(parsed.files.len(), 1);
    }

    #[test]
    fn double_brace_standard_json_payload() {
        let raw = r#"{{"language":"Solidity","sources":{"/contracts/A.sol":{"content":"contract A {}"},"contracts/B.sol":{"content":"contract B {}"}},"settings":{}}}"#;
        let parsed = parse_contract_source(raw, "A").unwrap();
        assert_eq!(parsed.kind, SourceKind::MultiFile);
        assert_eq!(parsed.files.len(), 2);
        // Leading slash cleaned.
        assert!(parsed.files.iter().any(|f| f.path == "contracts/A.sol"));
        assert_eq!(parsed.main_file, "contracts/A.sol");
    }

    #[test]
    fn legacy_map_payload_skips_metadata_keys() {
        let raw = r#"{"Token.sol":{"content":"contract Token {}"},"language":"Solidity"}"#;
        let parsed = parse_contract_source(raw, "Token").unwrap();
        assert_eq!(parsed.kind, SourceKind::MultiFile);
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.files[0].path, "Token.sol");
    }

    #[test]
    fn malformed_json_falls_back_to_single_file() {
        let raw = "{ this is not json";
        let parsed = parse_contract_source(raw, "Odd").unwrap();
        assert_eq!(parsed.kind, SourceKind::Single);
    }

    fn test_config() -> &'static ExplorerConfig {
        get_explorer_config("arbiscan.io").unwrap()
    }

    #[tokio::test]
    async fn fetches_a_verified_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("module", "contract"))
            .and(query_param("action", "getsourcecode"))
            .and(query_param("chainid", "42161"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "1",
                "message": "OK",
                "result": [{
                    "SourceCode": "contract Counter {}",
                    "ABI": "[]",
                    "ContractName": "Counter",
                    "CompilerVersion": "v0.8.23",
                    "OptimizationUsed": "1"
                }]
            })))
            .mount(&server)
            .await;

        let record = fetch_contract_record(
            test_config(),
            &server.uri(),
            "0x1111111111111111111111111111111111111111",
            Some("test-key"),
        )
        .await
        .unwrap();
        assert_eq!(record.contract_name, "Counter");
        assert_eq!(record.optimization_used, "1");
    }

    #[tokio::test]
    async fn unverified_contract_is_an_explorer_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "1",
                "message": "OK",
                "result": [{ "SourceCode": "", "ABI": "", "ContractName": "" }]
            })))
            .mount(&server)
            .await;

        let err = fetch_contract_record(
            test_config(),
            &server.uri(),
            "0x1111111111111111111111111111111111111111",
            None,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not verified"));
    }

    #[tokio::test]
    async fn notok_envelope_surfaces_result_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "0",
                "message": "NOTOK",
                "result": "Max rate limit reached"
            })))
            .mount(&server)
            .await;

        let err = fetch_contract_record(
            test_config(),
            &server.uri(),
            "0x1111111111111111111111111111111111111111",
            None,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Max rate limit reached"));
    }
}
