use std::path::PathBuf;

use crate::error::{Error, Result};

/// A parsed request written to the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    File(PathBuf),
    Process(i32),
}

impl Command {
    /// Parses `filename: <path>` or `pid: <integer>`. The filename form is
    /// tried first. Payloads longer than `limit` bytes are rejected, never
    /// truncated.
    pub fn parse(payload: &str, limit: usize) -> Result<Command> {
        if payload.len() > limit {
            return Err(Error::CommandTooLong {
                len: payload.len(),
                limit,
            });
        }
        let line = payload.trim_end_matches(|c| c == '\n' || c == '\r');
        let body = line.trim_start();
        // The path runs to the end of the line and may contain spaces.
        if let Some(path) = body.strip_prefix("filename:").map(str::trim) {
            if !path.is_empty() {
                return Ok(Command::File(PathBuf::from(path)));
            }
        }
        if body.starts_with("pid:") {
            if let Ok(pid) = scan_fmt!(body, "pid: {d}{e}", i32) {
                return Ok(Command::Process(pid));
            }
        }
        Err(Error::InvalidCommand(format!("can't parse {:?}", line)))
    }

    /// The line a client sends for this command.
    pub fn to_line(&self) -> String {
        match self {
            Command::File(path) => format!("filename: {}\n", path.display()),
            Command::Process(pid) => format!("pid: {}\n", pid),
        }
    }
}
