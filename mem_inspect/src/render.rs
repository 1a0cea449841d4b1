use std::fmt::Write;

use crate::flags;
use crate::query::{Handle, QueryState, Selection};
use crate::{CacheMapping, RegionChain};

pub const UNQUERIED_MESSAGE: &str = "No structs recorded to file\n";
pub const REGIONS_NOT_FOUND_MESSAGE: &str = "VM area struct with provided params not found\n";
pub const CACHE_NOT_FOUND_MESSAGE: &str = "Address space struct with provided params not found\n";

/// Renders the report for the current query.
///
/// A lookup that failed outright (permissions, I/O) is reported with its
/// reason instead of being passed off as "not found".
pub fn render(state: &QueryState) -> String {
    match (state.current(), state.failure()) {
        ((Selection::None, _), _) => UNQUERIED_MESSAGE.to_string(),
        ((_, Some(Handle::Regions(chain))), _) => render_regions(chain),
        ((_, Some(Handle::Cache(mapping))), _) => render_cache_mapping(mapping),
        ((Selection::ProcessMappings, None), Some(reason)) => {
            format!("VM area struct with provided params could not be read: {}\n", reason)
        }
        ((Selection::FileMapping, None), Some(reason)) => {
            format!("Address space struct with provided params could not be read: {}\n", reason)
        }
        ((Selection::ProcessMappings, None), None) => REGIONS_NOT_FOUND_MESSAGE.to_string(),
        ((Selection::FileMapping, None), None) => CACHE_NOT_FOUND_MESSAGE.to_string(),
    }
}

pub fn render_cache_mapping(mapping: &CacheMapping) -> String {
    let mut out = String::new();
    // Writing into a String can't fail.
    let _ = write!(
        out,
        "Address space structure: {{\n  page_count: {},\n  flags: {},\n  host: {},\n  shared_writable_count: {}\n}}\n",
        mapping.page_count, mapping.flags, mapping.owning_user_id, mapping.shared_writable_count
    );
    out
}

/// One block per region, in chain order. The last block has no `vm_next`.
pub fn render_regions(chain: &RegionChain) -> String {
    let mut out = String::new();
    for (idx, region) in chain.iter().enumerate() {
        let next = chain
            .next(idx)
            .map(|next| format!("{:x}", next.start))
            .unwrap_or_else(|| "-".to_string());
        let _ = write!(
            out,
            "VM area structure: {{\n  vm_start: {:x},\n  vm_end: {:x},\n  vm_flags: {},\n  decoded: {}\n  vm_pgoff: {:x},\n  vm_file: {},\n  vm_next: {}\n}}\n",
            region.start,
            region.end,
            flags::raw_hex(region.flags),
            flags::describe(region.flags),
            region.page_offset,
            region.file_name(),
            next
        );
    }
    out
}
