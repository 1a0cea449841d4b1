#[macro_use]
extern crate log;

use std::io;
use std::path::PathBuf;
use std::process;

use clap::{App, Arg};
use log::LevelFilter;
use simplelog::{Config, SimpleLogger};

use mem_inspect::client;
use mem_inspect::command::Command;
use mem_inspect::config;
use mem_inspect::Error;

fn main() {
    let matches = App::new("mem_inspect")
        .about("Asks mem_inspectd about a process's memory regions or a file's page cache")
        .arg(Arg::with_name("pid")
            .long("pid")
            .value_name("PID")
            .validator(|v| v.parse::<i32>().map(|_| ()).map_err(|e| e.to_string()))
            .conflicts_with("filename")
            .help("Dump the memory regions of this process"))
        .arg(Arg::with_name("filename")
            .long("filename")
            .value_name("PATH")
            .help("Dump the page cache mapping of this file"))
        .arg(Arg::with_name("socket")
            .long("socket")
            .value_name("PATH")
            .env(config::SOCKET_ENV)
            .default_value(config::DEFAULT_SOCKET_PATH))
        .arg(Arg::with_name("log-level")
            .long("log-level")
            .value_name("LEVEL")
            .possible_values(&["off", "error", "warn", "info", "debug", "trace"])
            .default_value("warn"))
        .get_matches();

    let level = matches
        .value_of("log-level")
        .and_then(|v| v.parse().ok())
        .unwrap_or(LevelFilter::Warn);
    if let Err(e) = SimpleLogger::init(level, Config::default()) {
        eprintln!("Unable to set up logging: {}", e);
    }

    let command = if let Some(pid) = matches.value_of("pid").and_then(|v| v.parse().ok()) {
        Command::Process(pid)
    } else if let Some(path) = matches.value_of("filename") {
        Command::File(PathBuf::from(path))
    } else {
        println!("Wrong params provided");
        return;
    };
    let socket = PathBuf::from(matches.value_of("socket").unwrap_or(config::DEFAULT_SOCKET_PATH));
    debug!("Sending {:?} to {}", command, socket.display());

    let stdout = io::stdout();
    let stderr = io::stderr();
    match client::query(&socket, &command, &mut stdout.lock(), &mut stderr.lock()) {
        Ok(()) => {}
        Err(e @ Error::Endpoint { .. }) => {
            println!("{}", e);
            process::exit(1);
        }
        Err(e) => eprintln!("{}", e),
    }
}
