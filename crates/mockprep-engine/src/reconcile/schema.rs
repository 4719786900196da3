//! Typed field access over an untyped `serde_json::Value`.
//!
//! Every accessor records a `ValidationIssue` instead of failing fast, so a
//! single pass reports everything wrong with a payload.

use mockprep_core::ValidationIssue;
use serde_json::{Map, Value};

#[derive(Debug, Default)]
pub(crate) struct Checker {
    issues: Vec<ValidationIssue>,
}

impl Checker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self, path: impl Into<String>, problem: impl Into<String>) {
        self.issues.push(ValidationIssue::new(path, problem));
    }

    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    pub fn into_issues(self) -> Vec<ValidationIssue> {
        self.issues
    }

    pub fn object<'v>(&mut self, value: &'v Value, path: &str) -> Option<&'v Map<String, Value>> {
        let obj = value.as_object();
        if obj.is_none() {
            self.issue(path, format!("expected an object, found {}", kind_of(value)));
        }
        obj
    }

    pub fn array<'v>(&mut self, value: Option<&'v Value>, path: &str) -> Option<&'v Vec<Value>> {
        match value {
            Some(Value::Array(items)) => Some(items),
            Some(other) => {
                self.issue(path, format!("expected an array, found {}", kind_of(other)));
                None
            }
            None => {
                self.issue(path, "missing required array");
                None
            }
        }
    }

    pub fn number(&mut self, value: Option<&Value>, path: &str) -> Option<f64> {
        match value {
            Some(Value::Number(n)) => n.as_f64(),
            Some(other) => {
                self.issue(path, format!("expected a number, found {}", kind_of(other)));
                None
            }
            None => {
                self.issue(path, "missing required number");
                None
            }
        }
    }

    pub fn uint(&mut self, value: Option<&Value>, path: &str) -> Option<u32> {
        match value {
            Some(Value::Number(n)) => match n.as_u64().and_then(|v| u32::try_from(v).ok()) {
                Some(v) => Some(v),
                None => {
                    self.issue(path, format!("expected a non-negative integer, found {}", n));
                    None
                }
            },
            Some(other) => {
                self.issue(
                    path,
                    format!("expected a non-negative integer, found {}", kind_of(other)),
                );
                None
            }
            None => {
                self.issue(path, "missing required integer");
                None
            }
        }
    }

    pub fn string(&mut self, value: Option<&Value>, path: &str) -> Option<String> {
        match value {
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                self.issue(path, format!("expected a string, found {}", kind_of(other)));
                None
            }
            None => {
                self.issue(path, "missing required string");
                None
            }
        }
    }

    pub fn non_empty_string(&mut self, value: Option<&Value>, path: &str) -> Option<String> {
        let s = self.string(value, path)?;
        if s.trim().is_empty() {
            self.issue(path, "expected a non-empty string");
            return None;
        }
        Some(s)
    }
}

/// First present key among `keys`.
pub(crate) fn field<'v>(obj: &'v Map<String, Value>, keys: &[&str]) -> Option<&'v Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
