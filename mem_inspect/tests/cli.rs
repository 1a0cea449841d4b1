use std::io::{self, Read, Write};
use std::os::unix::net::UnixListener;
use std::path::Path;
use std::process::{Command, Output};
use std::thread;

use mem_inspect::config::SOCKET_ENV;
use tempfile::TempDir;

fn mem_inspect(socket: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mem_inspect"))
        .env_remove(SOCKET_ENV)
        .arg("--socket")
        .arg(socket)
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn no_query_flag_prints_wrong_params_and_never_connects() {
    let dir = TempDir::new().unwrap();
    let socket = dir.path().join("io");
    let listener = UnixListener::bind(&socket).unwrap();
    listener.set_nonblocking(true).unwrap();

    let output = mem_inspect(&socket, &[]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Wrong params provided\n");
    match listener.accept() {
        Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
        other => panic!("client connected anyway: {:?}", other.map(|(_, addr)| addr)),
    }
}

#[test]
fn both_query_flags_are_rejected() {
    let dir = TempDir::new().unwrap();
    let output = mem_inspect(&dir.path().join("io"), &["--pid", "1", "--filename", "/etc/hostname"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn non_numeric_pid_is_rejected() {
    let dir = TempDir::new().unwrap();
    let output = mem_inspect(&dir.path().join("io"), &["--pid", "init"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn missing_endpoint_exits_with_failure() {
    let dir = TempDir::new().unwrap();
    let socket = dir.path().join("absent");
    let output = mem_inspect(&socket, &["--pid", "1"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("can't open endpoint"));
}

#[test]
fn relays_report_to_stdout() {
    let dir = TempDir::new().unwrap();
    let socket = dir.path().join("io");
    let listener = UnixListener::bind(&socket).unwrap();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = String::new();
        stream.read_to_string(&mut request).unwrap();
        stream.write_all(b"Address space structure: {\n  page_count: 0,\n}\n").unwrap();
        request
    });

    let output = mem_inspect(&socket, &["--filename", "/tmp/with space"]);
    assert!(output.status.success());
    assert_eq!(server.join().unwrap(), "filename: /tmp/with space\n");
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "Address space structure: {\n  page_count: 0,\n}\n"
    );
}
