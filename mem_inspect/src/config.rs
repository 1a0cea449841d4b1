use std::path::PathBuf;
use std::time::Duration;

use log::LevelFilter;

pub const DEFAULT_SOCKET_PATH: &str = "/run/mem_inspect/mem_inspect_io";
pub const DEFAULT_PROC_ROOT: &str = "/proc";
// Longest command line accepted on the endpoint, line terminator excluded.
pub const DEFAULT_MAX_COMMAND_LEN: usize = 4096;
pub const SOCKET_ENV: &str = "MEM_INSPECT_SOCKET";
// Seconds a connected client may stay silent before its session is dropped.
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub proc_root: PathBuf,
    pub max_command_len: usize,
    pub session_timeout: Option<Duration>,
    pub log_level: LevelFilter,
}

impl Default for ServiceConfig {
    fn default() -> ServiceConfig {
        ServiceConfig {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            max_command_len: DEFAULT_MAX_COMMAND_LEN,
            session_timeout: Some(Duration::from_secs(DEFAULT_SESSION_TIMEOUT_SECS)),
            log_level: LevelFilter::Info,
        }
    }
}
