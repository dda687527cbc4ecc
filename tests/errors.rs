use std::path::PathBuf;

use dayplan::error::{exit_codes, JsonError};
use dayplan::Error;

#[test]
fn user_errors_exit_with_two() {
    let errors = [
        Error::InvalidConfig("bad".to_string()),
        Error::InvalidArgument("bad".to_string()),
        Error::not_found("task", "abcd1234"),
        Error::NotInitialized(PathBuf::from("/tmp/nowhere")),
    ];
    for err in &errors {
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR, "{err}");
    }
}

#[test]
fn operation_failures_exit_with_four() {
    let errors = [
        Error::LockFailed(PathBuf::from("planner.json.lock")),
        Error::Dispatch("closed".to_string()),
        Error::OperationFailed("boom".to_string()),
        Error::Io(std::io::Error::other("disk")),
    ];
    for err in &errors {
        assert_eq!(err.exit_code(), exit_codes::OPERATION_FAILED, "{err}");
    }
}

#[test]
fn not_found_renders_details_for_json() {
    let err = Error::not_found("label", "urgent");
    assert_eq!(err.to_string(), "label not found: urgent");
    assert_eq!(err.kind(), "not_found");

    let rendered = serde_json::to_value(JsonError::from(&err)).unwrap();
    assert_eq!(rendered["message"], "label not found: urgent");
    assert_eq!(rendered["kind"], "not_found");
    assert_eq!(rendered["code"], 2);
    assert_eq!(rendered["details"]["entity"], "label");
    assert_eq!(rendered["details"]["id"], "urgent");
}

#[test]
fn errors_without_details_omit_the_field() {
    let err = Error::Dispatch("closed".to_string());
    let rendered = serde_json::to_value(JsonError::from(&err)).unwrap();
    assert!(rendered.get("details").is_none());
    assert_eq!(rendered["code"], 4);
}
