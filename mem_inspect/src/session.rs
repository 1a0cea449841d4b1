use std::str;

use crate::command::Command;
use crate::error::{Error, Result};
use crate::procfs::Resolver;
use crate::query::{QueryState, Resolution};
use crate::render;

/// One client's view of the endpoint: its own query state plus the resolver
/// used to fill it. Sessions share nothing, so two clients never see each
/// other's queries.
pub struct Session<'r, R: Resolver + ?Sized> {
    resolver: &'r R,
    state: QueryState,
    max_command_len: usize,
}

impl<'r, R: Resolver + ?Sized> Session<'r, R> {
    pub fn new(resolver: &'r R, max_command_len: usize) -> Session<'r, R> {
        Session {
            resolver,
            state: QueryState::Unqueried,
            max_command_len,
        }
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn max_command_len(&self) -> usize {
        self.max_command_len
    }

    /// Handles one write to the endpoint and returns the bytes consumed.
    ///
    /// A malformed payload is an error and leaves the state alone. A well
    /// formed one always replaces the state, even if what it names can't be
    /// found; the report says so on the next read.
    pub fn write(&mut self, payload: &[u8]) -> Result<usize> {
        if payload.len() > self.max_command_len {
            return Err(Error::CommandTooLong {
                len: payload.len(),
                limit: self.max_command_len,
            });
        }
        let text = str::from_utf8(payload)
            .map_err(|e| Error::InvalidCommand(format!("payload is not UTF-8: {}", e)))?;
        let command = Command::parse(text, self.max_command_len)?;
        info!("Got command {:?}", command);
        let next = match command {
            Command::Process(pid) => QueryState::Process {
                pid,
                chain: Resolution::from(self.resolver.resolve_process(pid).map_err(log_failure)),
            },
            Command::File(path) => QueryState::File {
                mapping: Resolution::from(self.resolver.resolve_file(&path).map_err(log_failure)),
                path,
            },
        };
        self.state.select(next);
        Ok(payload.len())
    }

    /// Renders the report for the current state. Computed fresh every time.
    pub fn read(&self) -> String {
        render::render(&self.state)
    }
}

fn log_failure(e: Error) -> Error {
    if e.is_soft() {
        error!("Query did not resolve: {}", e);
    } else {
        error!("Error while resolving query: {}", e);
    }
    e
}
