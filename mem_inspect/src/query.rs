use std::path::PathBuf;

use crate::error::Result;
use crate::{CacheMapping, RegionChain};

/// What kind of entity the current query is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    None,
    ProcessMappings,
    FileMapping,
}

/// Borrowed view of the resolved snapshot.
#[derive(Debug, Clone, Copy)]
pub enum Handle<'a> {
    Regions(&'a RegionChain),
    Cache(&'a CacheMapping),
}

/// Outcome of resolving a query. `Missing` covers entities that don't exist
/// (or have no address space); `Failed` covers lookups that hit an error,
/// such as a process whose maps we may not read.
#[derive(Debug, Clone)]
pub enum Resolution<T> {
    Found(T),
    Missing,
    Failed(String),
}

impl<T> Resolution<T> {
    pub fn found(&self) -> Option<&T> {
        match self {
            Resolution::Found(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<Result<T>> for Resolution<T> {
    fn from(result: Result<T>) -> Resolution<T> {
        match result {
            Ok(value) => Resolution::Found(value),
            Err(ref e) if e.is_soft() => Resolution::Missing,
            Err(e) => Resolution::Failed(e.to_string()),
        }
    }
}

/// The single current query of a session. Selection and handle live in the
/// same variant, so a process query can never carry a file snapshot.
#[derive(Debug, Clone)]
pub enum QueryState {
    Unqueried,
    Process { pid: i32, chain: Resolution<RegionChain> },
    File { path: PathBuf, mapping: Resolution<CacheMapping> },
}

impl Default for QueryState {
    fn default() -> QueryState {
        QueryState::Unqueried
    }
}

impl QueryState {
    pub fn selection(&self) -> Selection {
        match self {
            QueryState::Unqueried => Selection::None,
            QueryState::Process { .. } => Selection::ProcessMappings,
            QueryState::File { .. } => Selection::FileMapping,
        }
    }

    /// The resolved snapshot, `None` when nothing was queried or the
    /// query did not resolve.
    pub fn handle(&self) -> Option<Handle<'_>> {
        match self {
            QueryState::Unqueried => None,
            QueryState::Process { chain, .. } => chain.found().map(Handle::Regions),
            QueryState::File { mapping, .. } => mapping.found().map(Handle::Cache),
        }
    }

    /// Why the query could not be resolved, when it failed rather than
    /// found nothing.
    pub fn failure(&self) -> Option<&str> {
        match self {
            QueryState::Process {
                chain: Resolution::Failed(reason),
                ..
            }
            | QueryState::File {
                mapping: Resolution::Failed(reason),
                ..
            } => Some(reason),
            _ => None,
        }
    }

    pub fn current(&self) -> (Selection, Option<Handle<'_>>) {
        (self.selection(), self.handle())
    }

    /// Installs `next` in one step and hands back the query it replaced.
    pub fn select(&mut self, next: QueryState) -> QueryState {
        std::mem::replace(self, next)
    }
}
