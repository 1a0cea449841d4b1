#[macro_use]
extern crate scan_fmt;

extern crate chrono;

#[macro_use]
extern crate log;

pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod flags;
pub mod procfs;
pub mod query;
pub mod render;
pub mod server;
pub mod session;

use chrono::{DateTime, Utc};

pub use error::{Error, Result};

// Placeholder rendered for regions that have no file behind them.
pub const ANONYMOUS_FILE: &str = "-";

/// One contiguous virtual-address range of a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub start: u64,
    pub end: u64,
    pub flags: u64,
    // In pages, like vm_pgoff.
    pub page_offset: u64,
    pub backing_file_name: Option<String>,
}

impl Region {
    pub fn file_name(&self) -> &str {
        self.backing_file_name.as_deref().unwrap_or(ANONYMOUS_FILE)
    }
}

/// Every region of one process, in the order /proc listed them.
///
/// Collected once when the query is resolved; rendering walks it by index,
/// so the chain is never followed past `len()`.
#[derive(Debug, Clone)]
pub struct RegionChain {
    pub pid: i32,
    pub timestamp: DateTime<Utc>,
    regions: Vec<Region>,
}

impl RegionChain {
    pub fn new(pid: i32, regions: Vec<Region>) -> RegionChain {
        RegionChain {
            pid,
            timestamp: Utc::now(),
            regions,
        }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Region> {
        self.regions.get(idx)
    }

    /// The region following `idx`, or `None` at the end of the chain.
    pub fn next(&self, idx: usize) -> Option<&Region> {
        idx.checked_add(1).and_then(|next| self.regions.get(next))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Region> {
        self.regions.iter()
    }
}

/// Page-cache bookkeeping of one file, as seen when the query was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMapping {
    pub page_count: u64,
    pub flags: u64,
    pub owning_user_id: u64,
    pub shared_writable_count: u64,
}
