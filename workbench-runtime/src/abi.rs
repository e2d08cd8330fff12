//! Contract ABI parsing.
//!
//! The read/write split is a pure function of the declared mutability,
//! recomputed on demand rather than stored alongside the function.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkbenchError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    View,
    Pure,
    Nonpayable,
    Payable,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(rename = "internalType", skip_serializing_if = "Option::is_none")]
    pub internal_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFunction {
    pub name: String,
    #[serde(rename = "stateMutability")]
    pub state_mutability: StateMutability,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
}

/// Parse an ABI JSON array, keeping only `"type": "function"` entries.
pub fn parse_abi(abi_json: &str) -> Result<Vec<ParsedFunction>> {
    let items: Vec<serde_json::Value> = serde_json::from_str(abi_json)
        .map_err(|err| WorkbenchError::Validation(format!("ABI is not valid JSON: {err}")))?;

    let mut functions = Vec::new();
    for item in items {
        if item.get("type").and_then(|t| t.as_str()) != Some("function") {
            continue;
        }
        let function: ParsedFunction = serde_json::from_value(item)
            .map_err(|err| WorkbenchError::Validation(format!("Malformed ABI function: {err}")))?;
        functions.push(function);
    }
    Ok(functions)
}

pub fn is_read_function(function: &ParsedFunction) -> bool {
    matches!(
        function.state_mutability,
        StateMutability::View | StateMutability::Pure
    )
}

pub fn is_write_function(function: &ParsedFunction) -> bool {
    matches!(
        function.state_mutability,
        StateMutability::Nonpayable | StateMutability::Payable
    )
}

/// Partition functions into read (view/pure) and write (nonpayable/
/// payable) groups. Every function lands in exactly one group.
pub fn group_functions_by_type(
    functions: &[ParsedFunction],
) -> (Vec<ParsedFunction>, Vec<ParsedFunction>) {
    let read = functions
        .iter()
        .filter(|f| is_read_function(f))
        .cloned()
        .collect();
    let write = functions
        .iter()
        .filter(|f| is_write_function(f))
        .cloned()
        .collect();
    (read, write)
}

/// `name(type name, …) returns (type, …)` display form.
pub fn format_function_signature(function: &ParsedFunction) -> String {
    let params = function
        .inputs
        .iter()
        .map(|input| {
            if input.name.is_empty() {
                input.param_type.clone()
            } else {
                format!("{} {}", input.param_type, input.name)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    let returns = if function.outputs.is_empty() {
        String::new()
    } else {
        format!(
            " returns ({})",
            function
                .outputs
                .iter()
                .map(|o| o.param_type.clone())
                .collect::<Vec<_>>()
                .join(", ")
        )
    };
    format!("{}({params}){returns}", function.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABI: &str = r#"[
        {"type": "function", "name": "get", "stateMutability": "view",
         "inputs": [], "outputs": [{"name": "", "type": "uint256", "internalType": "uint256"}]},
        {"type": "function", "name": "increment", "stateMutability": "nonpayable",
         "inputs": [], "outputs": []},
        {"type": "function", "name": "setOwner", "stateMutability": "payable",
         "inputs": [{"name": "owner", "type": "address"}], "outputs": []},
        {"type": "event", "name": "Transfer", "inputs": []},
        {"type": "constructor", "inputs": []}
    ]"#;

    #[test]
    fn keeps_only_functions() {
        let functions = parse_abi(ABI).unwrap();
        assert_eq!(functions.len(), 3);
        assert_eq!(functions[0].name, "get");
        assert_eq!(functions[0].state_mutability, StateMutability::View);
    }

    #[test]
    fn parsing_is_idempotent() {
        let first = parse_abi(ABI).unwrap();
        let second = parse_abi(ABI).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn grouping_partitions_without_overlap_or_omission() {
        let functions = parse_abi(ABI).unwrap();
        let (read, write) = group_functions_by_type(&functions);
        assert_eq!(read.len() + write.len(), functions.len());
        assert!(read.iter().all(is_read_function));
        assert!(write.iter().all(is_write_function));
        assert_eq!(read[0].name, "get");
        assert_eq!(write.len(), 2);
    }

    #[test]
    fn invalid_json_is_a_validation_error() {
        assert!(matches!(
            parse_abi("not json"),
            Err(WorkbenchError::Validation(_))
        ));
    }

    #[test]
    fn formats_signatures() {
        let functions = parse_abi(ABI).unwrap();
        assert_eq!(
            format_function_signature(&functions[0]),
            "get() returns (uint256)"
        );
        assert_eq!(
            format_function_signature(&functions[2]),
            "setOwner(address owner)"
        );
    }
}
