use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;

use mem_inspect::client;
use mem_inspect::command::Command;
use mem_inspect::config::ServiceConfig;
use mem_inspect::procfs::ProcFs;
use mem_inspect::server::Server;
use tempfile::TempDir;

fn start_server(dir: &Path) -> PathBuf {
    let config = ServiceConfig {
        socket_path: dir.join("mem_inspect_io"),
        ..ServiceConfig::default()
    };
    let socket = config.socket_path.clone();
    let server = Server::bind(config, ProcFs::default()).unwrap();
    thread::spawn(move || server.run());
    socket
}

fn ask(socket: &Path, command: Command) -> String {
    let mut out = Vec::new();
    let mut diag = Vec::new();
    client::query(socket, &command, &mut out, &mut diag).unwrap();
    assert!(diag.is_empty(), "{}", String::from_utf8_lossy(&diag));
    String::from_utf8(out).unwrap()
}

fn field<'a>(block: &'a str, name: &str) -> &'a str {
    block
        .lines()
        .filter_map(|l| l.trim().strip_prefix(name))
        .map(|v| v.trim_start_matches(": ").trim_end_matches(','))
        .next()
        .unwrap_or_else(|| panic!("no {} in {}", name, block))
}

#[test]
fn reports_own_memory_regions() {
    let dir = TempDir::new().unwrap();
    let socket = start_server(dir.path());

    let report = ask(&socket, Command::Process(process::id() as i32));
    let blocks: Vec<&str> = report.split("VM area structure: {").skip(1).collect();
    assert!(!blocks.is_empty(), "{}", report);
    for block in &blocks {
        let start = u64::from_str_radix(field(block, "vm_start"), 16).unwrap();
        let end = u64::from_str_radix(field(block, "vm_end"), 16).unwrap();
        assert!(start < end);
        assert!(!field(block, "vm_file").is_empty());
    }
    assert_eq!(field(blocks[blocks.len() - 1], "vm_next"), "-");
    assert!(report.contains("  decoded: "));
}

#[test]
fn reports_file_cache_mapping() {
    let dir = TempDir::new().unwrap();
    let socket = start_server(dir.path());
    let file = dir.path().join("hostname");
    fs::write(&file, "testhost\n").unwrap();

    let report = ask(&socket, Command::File(file));
    assert!(report.starts_with("Address space structure: {"), "{}", report);
    // Freshly written, so its one page is in the page cache.
    assert_eq!(field(&report, "page_count"), "1");
    for name in ["flags", "host", "shared_writable_count"].iter() {
        assert!(field(&report, name).parse::<u64>().is_ok());
    }
}

#[test]
fn missing_entities_report_not_found() {
    let dir = TempDir::new().unwrap();
    let socket = start_server(dir.path());

    // pid_max tops out at 2^22.
    let report = ask(&socket, Command::Process(1 << 23));
    assert_eq!(report, "VM area struct with provided params not found\n");

    let report = ask(&socket, Command::File(dir.path().join("no/such/file")));
    assert_eq!(report, "Address space struct with provided params not found\n");
}

#[test]
fn sessions_start_fresh() {
    let dir = TempDir::new().unwrap();
    let socket = start_server(dir.path());
    let file = dir.path().join("data");
    fs::write(&file, "x").unwrap();

    ask(&socket, Command::File(file));
    let report = ask(&socket, Command::Process(1 << 23));
    assert!(!report.contains("page_count"));
}
