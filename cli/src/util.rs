use std::path::Path;

use presence_core::StatusError;
use presence_core::error::{ErrorReport, codes};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!(
        "{}",
        serde_json::to_string_pretty(&err).unwrap_or_else(|_| err.to_string())
    );
    std::process::exit(1);
}

/// Pretty-prints `value` to stdout and returns the exit code.
pub fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(body) => {
            println!("{body}");
            0
        }
        Err(e) => exit_error(&format!("Failed to encode output: {e}"), None),
    }
}

/// Writes the structured report for `err` to stderr and returns the exit code.
pub fn report(err: &StatusError, correlation_id: &str) -> i32 {
    let report = ErrorReport::new(err, correlation_id);
    match serde_json::to_string_pretty(&report) {
        Ok(body) => eprintln!("{body}"),
        Err(_) => eprintln!("{err}"),
    }
    exit_code(err)
}

/// 1 for caller mistakes, 2 for store failures.
pub fn exit_code(err: &StatusError) -> i32 {
    match err.root().code() {
        codes::NOT_FOUND | codes::INVARIANT_VIOLATION => 1,
        _ => 2,
    }
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&raw).map_err(|e| format!("Invalid JSON in {}: {e}", path.display()))
}

pub fn parse_json_arg<T: DeserializeOwned>(raw: &str, flag: &str) -> Result<T, String> {
    serde_json::from_str(raw).map_err(|e| format!("Invalid JSON in --{flag}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_core::error::SeedStage;

    #[test]
    fn test_exit_code_for_caller_errors() {
        assert_eq!(exit_code(&StatusError::not_found("channel", "id", "x")), 1);
        assert_eq!(exit_code(&StatusError::invariant("name", "nope")), 1);
    }

    #[test]
    fn test_exit_code_looks_through_provisioning_stage() {
        let err = StatusError::not_found("channel status", "name", "Busy")
            .in_stage(SeedStage::Signals, "call_answered");
        assert_eq!(exit_code(&err), 1);

        let err = StatusError::persisting("tenant")(presence_core::RepoError::Conflict(
            "tenants_name_key".into(),
        ))
        .in_stage(SeedStage::Tenant, "t1");
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn test_parse_json_arg_names_the_flag() {
        let err = parse_json_arg::<serde_json::Value>("{not json", "data").unwrap_err();
        assert!(err.starts_with("Invalid JSON in --data"), "{err}");
    }

    #[test]
    fn test_read_json_reports_missing_file() {
        let path = std::env::temp_dir().join(format!("presence-missing-{}.json", uuid::Uuid::now_v7()));
        let err = read_json::<serde_json::Value>(&path).unwrap_err();
        assert!(err.starts_with("Failed to read"), "{err}");
    }
}
