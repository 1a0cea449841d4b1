#[macro_use]
extern crate log;

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{App, Arg};
use log::LevelFilter;
use simplelog::{Config, SimpleLogger};

use mem_inspect::config::{self, ServiceConfig};
use mem_inspect::procfs::ProcFs;
use mem_inspect::server::Server;

fn main() {
    let matches = App::new("mem_inspectd")
        .about("Serves memory region and page cache reports over a unix socket")
        .arg(Arg::with_name("socket")
            .long("socket")
            .value_name("PATH")
            .env(config::SOCKET_ENV)
            .default_value(config::DEFAULT_SOCKET_PATH)
            .help("Endpoint clients connect to"))
        .arg(Arg::with_name("proc-root")
            .long("proc-root")
            .value_name("DIR")
            .default_value(config::DEFAULT_PROC_ROOT)
            .help("Where procfs is mounted"))
        .arg(Arg::with_name("max-command-len")
            .long("max-command-len")
            .value_name("BYTES")
            .validator(|v| v.parse::<usize>().map(|_| ()).map_err(|e| e.to_string()))
            .help("Longest command line accepted; longer ones are rejected"))
        .arg(Arg::with_name("session-timeout")
            .long("session-timeout")
            .value_name("SECS")
            .validator(|v| match v.parse::<u64>() {
                Ok(0) => Err("must be at least 1".to_string()),
                Ok(_) => Ok(()),
                Err(e) => Err(e.to_string()),
            })
            .help("Drop clients that stay silent this long"))
        .arg(Arg::with_name("log-level")
            .long("log-level")
            .value_name("LEVEL")
            .possible_values(&["off", "error", "warn", "info", "debug", "trace"])
            .default_value("info"))
        .get_matches();

    let mut service = ServiceConfig::default();
    if let Some(socket) = matches.value_of("socket") {
        service.socket_path = PathBuf::from(socket);
    }
    if let Some(root) = matches.value_of("proc-root") {
        service.proc_root = PathBuf::from(root);
    }
    if let Some(len) = matches.value_of("max-command-len").and_then(|v| v.parse().ok()) {
        service.max_command_len = len;
    }
    if let Some(secs) = matches.value_of("session-timeout").and_then(|v| v.parse().ok()) {
        service.session_timeout = Some(Duration::from_secs(secs));
    }
    service.log_level = matches
        .value_of("log-level")
        .and_then(|v| v.parse().ok())
        .unwrap_or(LevelFilter::Info);

    if let Err(e) = SimpleLogger::init(service.log_level, Config::default()) {
        eprintln!("Unable to set up logging: {}", e);
    }
    info!("Starting with {:?}", service);

    let resolver = ProcFs::new(service.proc_root.clone());
    let server = match Server::bind(service, resolver) {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };
    if let Err(e) = server.run() {
        error!("Endpoint failed: {}", e);
        process::exit(1);
    }
}
