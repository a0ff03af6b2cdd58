//! Typed error contract shared by the library and the CLI.
//!
//! Every failure carries a stable machine-readable code, a human message,
//! structured details, and optional actionable hints. The CLI maps codes to
//! exit codes and serializes the whole thing into the JSON envelope.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    ConfigMissingFile,
    ConfigInvalidJson,
    ConfigInvalidValue,
    ValidationInvalidArgument,
    PipelineUnknownTask,
    PipelineDuplicateTask,
    PipelineCycle,
    PipelineTaskFailed,
    ToolFailed,
    AssetMissing,
    RemoteCommandFailed,
    RemoteLocked,
    SshIdentityFileNotFound,
    InternalIo,
    InternalJson,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingFile => "config.missing_file",
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",
            ErrorCode::PipelineUnknownTask => "pipeline.unknown_task",
            ErrorCode::PipelineDuplicateTask => "pipeline.duplicate_task",
            ErrorCode::PipelineCycle => "pipeline.cycle",
            ErrorCode::PipelineTaskFailed => "pipeline.task_failed",
            ErrorCode::ToolFailed => "tool.failed",
            ErrorCode::AssetMissing => "asset.missing",
            ErrorCode::RemoteCommandFailed => "remote.command_failed",
            ErrorCode::RemoteLocked => "remote.locked",
            ErrorCode::SshIdentityFileNotFound => "ssh.identity_file_not_found",
            ErrorCode::InternalIo => "internal.io_error",
            ErrorCode::InternalJson => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

/// Actionable follow-up surfaced alongside an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hint {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl Hint {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            command: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

impl Error {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Value::Null,
            hints: Vec::new(),
        }
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_hint(mut self, hint: Hint) -> Self {
        self.hints.push(hint);
        self
    }

    // === Configuration ===

    pub fn config_missing_file(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ConfigMissingFile,
            format!("Configuration file not found: {}", path),
        )
        .with_details(json!({ "path": path.clone() }))
        .with_hint(Hint::new(format!(
            "Create {} with at least {{\"ssh\": {{\"host\": \"...\", \"user\": \"...\"}}, \"rootDir\": \"/var/www/app/\"}}",
            path
        )))
    }

    pub fn config_invalid_json(path: impl Into<String>, source: impl fmt::Display) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ConfigInvalidJson,
            format!("Invalid JSON in {}: {}", path, source),
        )
        .with_details(json!({ "path": path }))
    }

    pub fn config_invalid_value(
        field: impl Into<String>,
        value: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        let field = field.into();
        let message = message.into();
        Self::new(
            ErrorCode::ConfigInvalidValue,
            format!("Invalid value for '{}': {}", field, message),
        )
        .with_details(json!({ "field": field, "value": value }))
    }

    // === Validation ===

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        message: impl Into<String>,
        value: Option<String>,
        suggestions: Option<Vec<String>>,
    ) -> Self {
        let field = field.into();
        let message = message.into();
        let mut err = Self::new(ErrorCode::ValidationInvalidArgument, message)
            .with_details(json!({ "field": field, "value": value }));
        if let Some(suggestions) = suggestions {
            for suggestion in suggestions {
                err.hints.push(Hint::new(suggestion));
            }
        }
        err
    }

    // === Task graph ===

    pub fn pipeline_unknown_task(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(
            ErrorCode::PipelineUnknownTask,
            format!("Unknown task '{}'", name),
        )
        .with_details(json!({ "task": name }))
    }

    pub fn pipeline_duplicate_task(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(
            ErrorCode::PipelineDuplicateTask,
            format!("Task '{}' is registered twice", name),
        )
        .with_details(json!({ "task": name }))
    }

    pub fn pipeline_cycle(pending: Vec<String>) -> Self {
        Self::new(
            ErrorCode::PipelineCycle,
            format!("Task dependencies contain a cycle: {}", pending.join(", ")),
        )
        .with_details(json!({ "tasks": pending }))
    }

    pub fn pipeline_task_failed(task: impl Into<String>, source: &Error) -> Self {
        let task = task.into();
        Self {
            code: ErrorCode::PipelineTaskFailed,
            message: format!("Task '{}' failed: {}", task, source.message),
            details: json!({ "task": task, "cause": source.code.as_str() }),
            hints: source.hints.clone(),
        }
    }

    // === Transforms / assets ===

    pub fn tool_failed(
        tool: impl Into<String>,
        command: impl Into<String>,
        exit_code: i32,
        output_tail: impl Into<String>,
    ) -> Self {
        let tool = tool.into();
        let command = command.into();
        let tail = output_tail.into();
        let mut message = format!("Tool '{}' failed (exit code {})", tool, exit_code);
        if !tail.is_empty() {
            message.push_str(&format!("\n--- Tool output (tail) ---\n{}", tail));
        }
        let mut err = Self::new(ErrorCode::ToolFailed, message)
            .with_details(json!({ "tool": tool, "command": command, "exitCode": exit_code }));
        if exit_code == 127 {
            err.hints.push(Hint::new(
                "Command not found. Check that the tool is installed and in PATH.",
            ));
        }
        err
    }

    pub fn asset_missing(expected: impl Into<String>, step: impl Into<String>) -> Self {
        let expected = expected.into();
        let step = step.into();
        Self::new(
            ErrorCode::AssetMissing,
            format!(
                "Expected asset '{}' is missing before '{}'; the rewritten references would dangle",
                expected, step
            ),
        )
        .with_details(json!({ "expected": expected, "step": step }))
    }

    // === Remote deploy ===

    pub fn remote_command_failed(
        step: impl Into<String>,
        command: impl Into<String>,
        exit_code: i32,
        stderr: impl Into<String>,
    ) -> Self {
        let step = step.into();
        let command = command.into();
        let stderr = stderr.into();
        Self::new(
            ErrorCode::RemoteCommandFailed,
            format!(
                "Remote step '{}' failed (exit code {}): {}",
                step,
                exit_code,
                if stderr.is_empty() { &command } else { &stderr }
            ),
        )
        .with_details(json!({ "step": step, "command": command, "exitCode": exit_code }))
    }

    pub fn remote_locked(lock_path: impl Into<String>) -> Self {
        let lock_path = lock_path.into();
        Self::new(
            ErrorCode::RemoteLocked,
            format!(
                "Deploy lock '{}' already exists; another deploy may be in flight",
                lock_path
            ),
        )
        .with_details(json!({ "lock": lock_path.clone() }))
        .with_hint(Hint {
            message: "If no deploy is running, remove the stale lock".to_string(),
            command: Some(format!("rmdir {}", lock_path)),
        })
    }

    pub fn ssh_identity_file_not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::SshIdentityFileNotFound,
            format!("SSH identity file not found: {}", path),
        )
        .with_details(json!({ "path": path }))
    }

    // === Internal ===

    pub fn internal_io(message: impl Into<String>, operation: Option<String>) -> Self {
        Self::new(ErrorCode::InternalIo, message.into())
            .with_details(json!({ "operation": operation }))
    }

    pub fn internal_json(message: impl Into<String>, operation: Option<String>) -> Self {
        Self::new(ErrorCode::InternalJson, message.into())
            .with_details(json!({ "operation": operation }))
    }

    pub fn internal_unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalUnexpected, message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_dotted_strings() {
        assert_eq!(ErrorCode::InternalIo.as_str(), "internal.io_error");
        assert_eq!(ErrorCode::PipelineCycle.as_str(), "pipeline.cycle");
        assert_eq!(ErrorCode::RemoteLocked.as_str(), "remote.locked");
    }

    #[test]
    fn task_failed_wraps_cause() {
        let cause = Error::tool_failed("scripts", "npx tsc", 2, "TS2304: cannot find name");
        let err = Error::pipeline_task_failed("compile-scripts", &cause);
        assert_eq!(err.code, ErrorCode::PipelineTaskFailed);
        assert!(err.message.contains("compile-scripts"));
        assert!(err.message.contains("TS2304"));
        assert_eq!(err.details["cause"], "tool.failed");
    }

    #[test]
    fn tool_not_found_gets_hint() {
        let err = Error::tool_failed("styles", "npx sass", 127, "");
        assert!(!err.hints.is_empty());
    }
}
