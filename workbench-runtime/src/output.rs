//! Interpretation of captured toolchain output.
//!
//! Everything here is heuristic pattern matching over text the toolchain
//! prints for humans: diagnostic lines, progress noise, deployment
//! addresses and transaction hashes. Unrecognized lines are dropped, not
//! errors.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static ANSI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1B\[[0-?]*[ -/]*[@-~]").expect("ansi regex"));

static DIAGNOSTIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(error(?:\[[A-Z0-9]+\])?|warning):\s*(.+)$").expect("diagnostic regex")
});

static LOCATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-->\s*([^\s:]+):(\d+):(\d+)").expect("location regex"));

pub fn strip_ansi(text: &str) -> String {
    ANSI_RE.replace_all(text, "").into_owned()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A structured diagnostic extracted from compiler stderr.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompilationError {
    pub message: String,
    pub severity: Severity,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

/// Extract structured diagnostics from stderr text.
///
/// Matches the rustc line shape: a `error[EXXXX]: message` or
/// `warning: message` head line, optionally followed by a
/// `--> path:line:col` location before the next head line. Never fails;
/// text with no matching lines yields an empty vec.
pub fn parse_compilation_errors(stderr: &str) -> Vec<CompilationError> {
    let clean = strip_ansi(stderr);
    let mut errors: Vec<CompilationError> = Vec::new();

    for line in clean.lines() {
        let trimmed = line.trim();
        if let Some(caps) = DIAGNOSTIC_RE.captures(trimmed) {
            let severity = if caps[1].starts_with("error") {
                Severity::Error
            } else {
                Severity::Warning
            };
            errors.push(CompilationError {
                message: caps[2].trim().to_string(),
                severity,
                file: None,
                line: None,
                column: None,
            });
        } else if let Some(caps) = LOCATION_RE.captures(trimmed) {
            // Attach the location to the most recent diagnostic that
            // does not have one yet.
            if let Some(last) = errors.last_mut().filter(|e| e.file.is_none()) {
                last.file = Some(caps[1].to_string());
                last.line = caps[2].parse().ok();
                last.column = caps[3].parse().ok();
            }
        }
    }

    errors
}

/// Strip ANSI noise and drop bare `Compiling` progress lines (those
/// without a parenthesized crate path carry no diagnostic content).
pub fn format_cargo_output(output: &str) -> String {
    output
        .split('\n')
        .filter(|line| {
            let clean = strip_ansi(line);
            let clean = clean.trim();
            if clean.is_empty() {
                return false;
            }
            !(clean.starts_with("Compiling") && !clean.contains('('))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Heuristic classification of a line for display purposes. The flags
/// are not mutually exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OutputStyle {
    pub is_error: bool,
    pub is_warning: bool,
    pub is_success: bool,
}

pub fn output_style(line: &str) -> OutputStyle {
    let clean = strip_ansi(line).to_lowercase();
    OutputStyle {
        is_error: clean.contains("error") || clean.contains("failed"),
        is_warning: clean.contains("warning"),
        is_success: clean.contains("finished") || clean.contains('✓'),
    }
}

static ADDRESS_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)deployed code at address:\s*(0x[a-fA-F0-9]{40})",
        r"(?i)contract address:\s*(0x[a-fA-F0-9]{40})",
        r"(?i)activated at address:\s*(0x[a-fA-F0-9]{40})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("address regex"))
    .collect()
});

static DEPLOY_TX_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)deployment tx hash:\s*(0x[a-fA-F0-9]{64})",
        r"(?i)deployment transaction hash:\s*(0x[a-fA-F0-9]{64})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("deploy tx regex"))
    .collect()
});

static ACTIVATION_TX_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)contract activated.*tx hash:\s*(0x[a-fA-F0-9]{64})",
        r"(?i)wasm already activated.*(0x[a-fA-F0-9]{64})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("activation tx regex"))
    .collect()
});

static ANY_HASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"0x[a-fA-F0-9]{64}").expect("hash regex"));

/// Address and transaction hashes scraped from deploy output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeployInfo {
    pub contract_address: Option<String>,
    pub deployment_tx_hash: Option<String>,
    pub activation_tx_hash: Option<String>,
}

fn first_capture(res: &[Regex], text: &str) -> Option<String> {
    res.iter()
        .find_map(|re| re.captures(text).map(|c| c[1].to_string()))
}

pub fn extract_deploy_info(output: &str) -> DeployInfo {
    let text = strip_ansi(output);

    let contract_address = first_capture(&ADDRESS_RES, &text);
    let activation_tx_hash = first_capture(&ACTIVATION_TX_RES, &text);
    let deployment_tx_hash = first_capture(&DEPLOY_TX_RES, &text)
        // Fallback: first 32-byte hash anywhere in the output.
        .or_else(|| ANY_HASH_RE.find(&text).map(|m| m.as_str().to_string()));

    DeployInfo {
        contract_address,
        deployment_tx_hash,
        activation_tx_hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STDERR: &str = "\
   Compiling stylus-project v0.1.0
error[E0412]: cannot find type `U257` in this scope
  --> src/lib.rs:16:31
   |
16 |     pub fn get(&self) -> U257 {
   |                               ^^^^ not found in this scope
warning: unused variable: `value`
  --> src/lib.rs:30:20
error: aborting due to 1 previous error
";

    #[test]
    fn parses_errors_and_warnings_with_locations() {
        let errors = parse_compilation_errors(STDERR);
        assert_eq!(errors.len(), 3);

        assert_eq!(errors[0].severity, Severity::Error);
        assert_eq!(errors[0].message, "cannot find type `U257` in this scope");
        assert_eq!(errors[0].file.as_deref(), Some("src/lib.rs"));
        assert_eq!(errors[0].line, Some(16));
        assert_eq!(errors[0].column, Some(31));

        assert_eq!(errors[1].severity, Severity::Warning);
        assert_eq!(errors[1].line, Some(30));

        // Summary line has no location.
        assert_eq!(errors[2].file, None);
    }

    #[test]
    fn unrecognized_text_yields_no_errors() {
        assert!(parse_compilation_errors("nothing interesting here").is_empty());
        assert!(parse_compilation_errors("").is_empty());
    }

    #[test]
    fn strips_ansi_before_matching() {
        let colored = "\x1b[31merror\x1b[0m: broken\n  --> src/lib.rs:1:1";
        let errors = parse_compilation_errors(colored);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "broken");
    }

    #[test]
    fn format_drops_bare_compiling_lines() {
        let input = "Compiling foo\nCompiling bar (/tmp/bar)\n\nFinished release";
        let out = format_cargo_output(input);
        assert!(!out.contains("Compiling foo"));
        assert!(out.contains("Compiling bar (/tmp/bar)"));
        assert!(out.contains("Finished release"));
    }

    #[test]
    fn style_flags_are_not_exclusive() {
        let style = output_style("error: build failed with warning");
        assert!(style.is_error);
        assert!(style.is_warning);
        assert!(!style.is_success);

        assert!(output_style("Finished `release` profile").is_success);
        assert!(output_style("✓ deployment complete").is_success);
    }

    #[test]
    fn extracts_deploy_address_and_hashes() {
        let output = "\
deployed code at address: 0x33f54de59419570a9442e788f5dd5cf635b3c7ac
deployment tx hash: 0x2c8bcab0971a376bd4ded4d5a2f1ea551a6f8afa283a1a8c4f0b21d5a1b5e9ab
contract activated and ready onchain with tx hash: 0x8e1f1a872b4c3b23da52fe4ac70ddcae2a1f239b4a3bbd4f67c43f55b4d3b7cd
";
        let info = extract_deploy_info(output);
        assert_eq!(
            info.contract_address.as_deref(),
            Some("0x33f54de59419570a9442e788f5dd5cf635b3c7ac")
        );
        assert!(info.deployment_tx_hash.as_deref().unwrap().starts_with("0x2c8bca"));
        assert!(info.activation_tx_hash.as_deref().unwrap().starts_with("0x8e1f1a"));
    }

    #[test]
    fn falls_back_to_first_hash_for_deployment_tx() {
        let output = "submitted 0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let info = extract_deploy_info(output);
        assert_eq!(info.contract_address, None);
        assert!(info.deployment_tx_hash.is_some());
        assert_eq!(info.activation_tx_hash, None);
    }
}
