//! Gateway wire types (JSON API requests and responses).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// POST /login form body.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub user: String,
    pub pass: String,
}

/// POST /api/run request body: one command invocation.
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub command: String,
    /// Raw argument values keyed by argument name; validated against the
    /// command's schema before anything is spawned.
    #[serde(default)]
    pub args: HashMap<String, serde_json::Value>,
}

/// POST /api/run response: the supervised invocation's structured result.
/// Execution failures still use this shape (with `ok: false`); the caller
/// needs the tool's own diagnostic output.
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub ok: bool,
    pub command: String,
    /// The exact argument vector handed to the executable (command name
    /// first, basedir second).
    pub argv: Vec<String>,
    pub code: Option<i32>,
    pub signal: Option<String>,
    pub stdout: String,
    pub stderr: String,
}

/// GET /api/commands response: the full registry plus resolved paths.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandsResponse {
    pub basedir: String,
    pub executable_path: String,
    pub commands: Vec<crate::commands::CommandSpec>,
}

/// Generic `{ok: false, error}` body for 4xx responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}
