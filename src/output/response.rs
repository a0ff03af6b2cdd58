//! CLI response formatting and output.
//!
//! Provides the JSON envelope, printing, and exit code mapping.

use serde::Serialize;
use shipwright::error::Hint;
use shipwright::{Error, ErrorCode, Result};

#[derive(Debug, Serialize)]
pub struct CliResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CliError>,
}

#[derive(Debug, Serialize)]
pub struct CliError {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<Hint>>,
}

impl<T: Serialize> CliResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::internal_json(e.to_string(), Some("serialize response".to_string()))
        })
    }
}

impl CliResponse<()> {
    pub fn from_error(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(CliError {
                code: err.code.as_str().to_string(),
                message: err.message.clone(),
                details: err.details.clone(),
                hints: if err.hints.is_empty() {
                    None
                } else {
                    Some(err.hints.clone())
                },
            }),
        }
    }
}

fn print_response<T: Serialize>(response: &CliResponse<T>) {
    use std::io::{self, Write};

    let payload = match response.to_json() {
        Ok(payload) => payload,
        Err(err) => {
            eprintln!("Failed to serialize response: {}", err);
            return;
        }
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    // BrokenPipe means the consumer went away; exit gracefully on SIGPIPE.
    let _ = writeln!(handle, "{}", payload);
}

/// Print the envelope for a command result and return the exit code.
pub fn print_result<T: Serialize>(result: Result<(T, i32)>) -> i32 {
    match result {
        Ok((data, exit_code)) => {
            print_response(&CliResponse::success(data));
            exit_code
        }
        Err(err) => {
            let exit_code = exit_code_for_error(err.code);
            print_response(&CliResponse::<()>::from_error(&err));
            exit_code
        }
    }
}

pub fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigMissingFile
        | ErrorCode::ConfigInvalidJson
        | ErrorCode::ConfigInvalidValue
        | ErrorCode::ValidationInvalidArgument
        | ErrorCode::PipelineUnknownTask
        | ErrorCode::PipelineDuplicateTask
        | ErrorCode::PipelineCycle => 2,
        ErrorCode::PipelineTaskFailed
        | ErrorCode::ToolFailed
        | ErrorCode::AssetMissing
        | ErrorCode::RemoteCommandFailed
        | ErrorCode::RemoteLocked
        | ErrorCode::SshIdentityFileNotFound
        | ErrorCode::InternalIo
        | ErrorCode::InternalJson
        | ErrorCode::InternalUnexpected => 1,
    }
}
