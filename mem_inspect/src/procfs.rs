use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr;

use nix::errno::Errno;
use nix::libc;
use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};
use nix::sys::stat::{stat, FileStat, SFlag};
use nix::unistd::{sysconf, SysconfVar};

use crate::error::{Error, Result};
use crate::flags;
use crate::{CacheMapping, Region, RegionChain};

const DEFAULT_PAGE_SIZE: u64 = 4096;

// Permission column bits, same positions as in vm_flags.
const PERM_READ: u64 = 0x1;
const PERM_WRITE: u64 = 0x2;
const PERM_EXEC: u64 = 0x4;
const PERM_SHARED: u64 = 0x8;

/// Looks up the live state a query asks about.
///
/// `Err(NotFound)` and `Err(NoAddressSpace)` mean "nothing there" and are
/// expected; anything else is a real failure.
pub trait Resolver: Send + Sync {
    fn resolve_process(&self, pid: i32) -> Result<RegionChain>;
    fn resolve_file(&self, path: &Path) -> Result<CacheMapping>;
}

/// Resolves queries through a procfs mount.
pub struct ProcFs {
    root: PathBuf,
    page_size: u64,
}

impl ProcFs {
    pub fn new<P: Into<PathBuf>>(root: P) -> ProcFs {
        ProcFs::with_page_size(root, system_page_size())
    }

    pub fn with_page_size<P: Into<PathBuf>>(root: P, page_size: u64) -> ProcFs {
        ProcFs {
            root: root.into(),
            page_size: std::cmp::max(page_size, 1),
        }
    }

    fn read_regions(&self, pid: i32) -> Result<Vec<Region>> {
        let task_dir = self.root.join(pid.to_string());
        // smaps carries VmFlags; maps only the rwxs column. Both list the
        // same header lines.
        let file = match File::open(task_dir.join("smaps")) {
            Ok(file) => file,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound && !task_dir.exists() => {
                return Err(Error::NotFound(format!("pid {}", pid)));
            }
            Err(e) => {
                warn!("Can't read smaps of pid {} ({}), falling back to maps", pid, e);
                File::open(task_dir.join("maps")).map_err(|e| match e.kind() {
                    io::ErrorKind::NotFound => Error::NotFound(format!("pid {}", pid)),
                    _ => Error::Transfer(e),
                })?
            }
        };
        let mut regions: Vec<Region> = Vec::new();
        for line in lossy_lines(file) {
            let line = line?;
            if let Some(vm_flags) = line.strip_prefix("VmFlags:") {
                match regions.last_mut() {
                    Some(region) => region.flags = flags::word_from_codes(vm_flags.split_whitespace()),
                    None => debug!("VmFlags line before any region in pid {}", pid),
                }
            } else if let Some(entry) = MapsEntry::parse(&line) {
                if entry.start >= entry.end {
                    debug!("Skipping empty region {:x}-{:x}", entry.start, entry.end);
                    continue;
                }
                regions.push(entry.into_region(self.page_size));
            }
        }
        Ok(regions)
    }

    /// Counts shared writable mappings of one inode over every process.
    fn shared_writable_mappings(&self, device: (u64, u64), inode: u64) -> u64 {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Can't list {}: {}", self.root.display(), e);
                return 0;
            }
        };
        let mut count = 0;
        for entry in entries.filter_map(|e| e.ok()) {
            let is_pid = entry.file_name().to_str().map_or(false, |name| name.parse::<u32>().is_ok());
            if !is_pid {
                continue;
            }
            // Processes come and go, and some are not ours to read.
            let file = match File::open(entry.path().join("maps")) {
                Ok(file) => file,
                Err(_) => continue,
            };
            count += lossy_lines(file)
                .filter_map(|line| line.ok())
                .filter_map(|line| MapsEntry::parse(&line))
                .filter(|m| m.inode == inode && m.device == device)
                .filter(|m| m.perm_flags() & (PERM_WRITE | PERM_SHARED) == PERM_WRITE | PERM_SHARED)
                .count() as u64;
        }
        count
    }
}

impl Default for ProcFs {
    fn default() -> ProcFs {
        ProcFs::new("/proc")
    }
}

impl Resolver for ProcFs {
    fn resolve_process(&self, pid: i32) -> Result<RegionChain> {
        if pid <= 0 {
            return Err(Error::NotFound(format!("pid {}", pid)));
        }
        if !self.root.join(pid.to_string()).is_dir() {
            return Err(Error::NotFound(format!("pid {}", pid)));
        }
        let chain = RegionChain::new(pid, self.read_regions(pid)?);
        // Kernel threads and zombies have an empty maps file.
        if chain.is_empty() {
            return Err(Error::NoAddressSpace(pid));
        }
        info!("Collected {} regions of pid {} at {}", chain.len(), pid, chain.timestamp);
        Ok(chain)
    }

    fn resolve_file(&self, path: &Path) -> Result<CacheMapping> {
        let parent = match path.parent() {
            Some(p) if p.as_os_str().is_empty() => Path::new("."),
            Some(p) => p,
            None => path,
        };
        let dir = stat_existing(parent, path)?;
        if SFlag::from_bits_truncate(dir.st_mode) & SFlag::S_IFMT != SFlag::S_IFDIR {
            return Err(Error::NotFound(path.display().to_string()));
        }
        let st = stat_existing(path, path)?;
        let is_regular = SFlag::from_bits_truncate(st.st_mode) & SFlag::S_IFMT == SFlag::S_IFREG;
        let page_count = if is_regular {
            resident_pages(path, st.st_size as u64)?
        } else {
            0
        };
        let mapping = CacheMapping {
            page_count,
            flags: st.st_mode as u64,
            owning_user_id: st.st_uid as u64,
            shared_writable_count: self.shared_writable_mappings(
                (dev_major(st.st_dev as u64), dev_minor(st.st_dev as u64)),
                st.st_ino as u64,
            ),
        };
        info!("Resolved {} to inode {} at {}", path.display(), st.st_ino, chrono::Utc::now());
        Ok(mapping)
    }
}

/// Lines of a procfs file. Paths in maps are arbitrary bytes, so invalid
/// UTF-8 is replaced rather than failing the whole read.
fn lossy_lines<R: io::Read>(file: R) -> impl Iterator<Item = io::Result<String>> {
    BufReader::new(file)
        .split(b'\n')
        .map(|line| line.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
}

/// A read-only shared mapping of a whole file, unmapped on drop.
struct FileMap {
    addr: *mut libc::c_void,
    len: usize,
}

impl FileMap {
    fn new(file: &File, len: usize) -> Result<FileMap> {
        let addr = unsafe {
            mmap(
                ptr::null_mut(),
                len,
                ProtFlags::PROT_READ,
                MapFlags::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )?
        };
        Ok(FileMap { addr, len })
    }
}

impl Drop for FileMap {
    fn drop(&mut self) {
        if let Err(e) = unsafe { munmap(self.addr, self.len) } {
            warn!("munmap of {} bytes failed: {}", self.len, e);
        }
    }
}

/// Pages of the file that sit in the page cache right now. Mapping the
/// file doesn't fault anything in, so mincore sees the cache as it was.
fn resident_pages(path: &Path, size: u64) -> Result<u64> {
    if size == 0 {
        return Ok(0);
    }
    let file = File::open(path)?;
    let len = size as usize;
    let map = FileMap::new(&file, len)?;
    let page_size = system_page_size() as usize;
    let mut residency = vec![0u8; (len + page_size - 1) / page_size];
    Errno::result(unsafe { libc::mincore(map.addr, map.len, residency.as_mut_ptr()) })?;
    Ok(residency.iter().filter(|&&page| page & 1 != 0).count() as u64)
}

fn stat_existing(target: &Path, asked: &Path) -> Result<FileStat> {
    stat(target).map_err(|e| match e {
        nix::Error::Sys(Errno::ENOENT) | nix::Error::Sys(Errno::ENOTDIR) => {
            Error::NotFound(asked.display().to_string())
        }
        e => Error::Os(e),
    })
}

pub fn system_page_size() -> u64 {
    match sysconf(SysconfVar::PAGE_SIZE) {
        Ok(Some(size)) if size > 0 => size as u64,
        _ => {
            warn!("Can't query page size, assuming {}", DEFAULT_PAGE_SIZE);
            DEFAULT_PAGE_SIZE
        }
    }
}

// glibc's dev_t layout.
fn dev_major(dev: u64) -> u64 {
    ((dev >> 8) & 0xfff) | ((dev >> 32) & !0xfff)
}

fn dev_minor(dev: u64) -> u64 {
    (dev & 0xff) | ((dev >> 12) & !0xff)
}

// The kernel separates the first five columns with single spaces and pads
// before the pathname, which may itself contain spaces.
fn pathname(line: &str) -> Option<String> {
    let path = line.splitn(6, ' ').nth(5)?.trim();
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

/// One header line of /proc/<pid>/maps or smaps:
/// `7f45c000-7f45e000 r-xp 00001000 08:01 123456    /usr/lib/libc.so.6`
#[derive(Debug, Clone, PartialEq, Eq)]
struct MapsEntry {
    start: u64,
    end: u64,
    perms: String,
    offset: u64,
    device: (u64, u64),
    inode: u64,
    path: Option<String>,
}

impl MapsEntry {
    fn parse(line: &str) -> Option<MapsEntry> {
        let (start, end, perms, offset, major, minor, inode) = scan_fmt!(
            line,
            "{x}-{x} {} {x} {x}:{x} {d}",
            [hex u64],
            [hex u64],
            String,
            [hex u64],
            [hex u64],
            [hex u64],
            u64
        )
        .ok()?;
        if perms.len() != 4 {
            return None;
        }
        Some(MapsEntry {
            start,
            end,
            perms,
            offset,
            device: (major, minor),
            inode,
            path: pathname(line),
        })
    }

    fn perm_flags(&self) -> u64 {
        let bits = [PERM_READ, PERM_WRITE, PERM_EXEC, PERM_SHARED];
        let set = ['r', 'w', 'x', 's'];
        self.perms
            .chars()
            .zip(set.iter().zip(bits.iter()))
            .filter(|(c, (expected, _))| c == *expected)
            .fold(0u64, |word, (_, (_, bit))| word | bit)
    }

    /// Final component of the backing file. Pseudo paths like `[heap]` are
    /// not files.
    fn file_name(&self) -> Option<String> {
        let path = self.path.as_ref()?;
        if !path.starts_with('/') {
            return None;
        }
        match path.rsplit('/').next() {
            Some(name) if !name.is_empty() => Some(name.to_string()),
            _ => Some(path.clone()),
        }
    }

    fn into_region(self, page_size: u64) -> Region {
        Region {
            start: self.start,
            end: self.end,
            flags: self.perm_flags(),
            page_offset: self.offset / page_size,
            backing_file_name: self.file_name(),
        }
    }
}
