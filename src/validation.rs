//! Structural pre-checks over raw request documents.
//!
//! Runs before the typed mapping, so a payload is only deserialized into an
//! entity once its required sections are known to exist. Failures come back
//! as a full list of messages, never one at a time.

use serde_json::Value;

pub fn contact_create(doc: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    match doc.get("personalInfo") {
        Some(Value::Object(info)) => {
            if !is_non_empty_string(info.get("fullName")) {
                errors.push("personalInfo.fullName must not be empty".to_string());
            }
            if !is_non_empty_string(info.get("cpf")) {
                errors.push("personalInfo.cpf must not be empty".to_string());
            }
        }
        Some(_) => errors.push("personalInfo must be an object".to_string()),
        None => errors.push("personalInfo is required".to_string()),
    }
    errors
}

pub fn contact_update(doc: &Value) -> Vec<String> {
    match doc.get("personalInfo") {
        Some(Value::Object(_)) => Vec::new(),
        Some(_) => vec!["personalInfo must be an object".to_string()],
        None => vec!["personalInfo is required".to_string()],
    }
}

// Company creation stays permissive while onboarding flows settle; the
// function is the extension point for step-level rules.
pub fn company_create(_doc: &Value) -> Vec<String> {
    Vec::new()
}

pub fn company_update(doc: &Value) -> Vec<String> {
    match doc.get("identification") {
        Some(Value::Object(_)) => Vec::new(),
        Some(_) => vec!["identification must be an object".to_string()],
        None => vec!["identification is required".to_string()],
    }
}

fn is_non_empty_string(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(s)) if !s.trim().is_empty())
}
