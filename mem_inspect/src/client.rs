use std::io::{BufRead, BufReader, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::Path;

use crate::command::Command;
use crate::error::{Error, Result};

/// Sends `command` to the endpoint at `socket` and copies the report to
/// `out` line by line.
///
/// Only failing to reach the endpoint is an error. A read fault partway
/// through is reported on `diag` and ends the copy, like a clean end of
/// stream would.
pub fn query<W: Write, D: Write>(socket: &Path, command: &Command, out: &mut W, diag: &mut D) -> Result<()> {
    let mut stream = UnixStream::connect(socket).map_err(|source| Error::Endpoint {
        path: socket.to_path_buf(),
        source,
    })?;
    debug!("Connected to {}", socket.display());

    stream.write_all(command.to_line().as_bytes())?;
    stream.shutdown(Shutdown::Write)?;

    copy_report(BufReader::new(stream), out, diag)
}

/// Copies the report line by line until end of stream or the first read
/// fault, which goes to `diag`. Lines already copied stay copied.
pub fn copy_report<B: BufRead, W: Write, D: Write>(mut reader: B, out: &mut W, diag: &mut D) -> Result<()> {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => out.write_all(line.as_bytes())?,
            Err(e) => {
                writeln!(diag, "Report reading failed: {}", e)?;
                break;
            }
        }
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Read};
    use std::os::unix::net::UnixListener;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn missing_endpoint_is_an_error() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("absent");
        let mut out = Vec::new();
        let mut diag = Vec::new();
        match query(&socket, &Command::Process(1), &mut out, &mut diag) {
            Err(Error::Endpoint { path, .. }) => assert_eq!(path, socket),
            other => panic!("unexpected {:?}", other),
        }
        assert!(out.is_empty());
    }

    // Hands out its lines, then fails instead of reaching end of stream.
    struct BrokenReport {
        lines: Vec<&'static [u8]>,
    }

    impl Read for BrokenReport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.lines.is_empty() {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away"));
            }
            let line = self.lines.remove(0);
            buf[..line.len()].copy_from_slice(line);
            Ok(line.len())
        }
    }

    #[test]
    fn read_fault_keeps_what_was_copied() {
        let reader = BufReader::new(BrokenReport {
            lines: vec![b"VM area structure: {\n"],
        });
        let mut out = Vec::new();
        let mut diag = Vec::new();
        copy_report(reader, &mut out, &mut diag).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "VM area structure: {\n");
        assert_eq!(String::from_utf8(diag).unwrap(), "Report reading failed: peer went away\n");
    }

    #[test]
    fn sends_command_and_copies_report() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("io");
        let listener = UnixListener::bind(&socket).unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = String::new();
            stream.read_to_string(&mut request).unwrap();
            stream.write_all(b"line one\nline two\n").unwrap();
            request
        });

        let mut out = Vec::new();
        let mut diag = Vec::new();
        query(&socket, &Command::Process(4321), &mut out, &mut diag).unwrap();

        assert_eq!(server.join().unwrap(), "pid: 4321\n");
        assert_eq!(String::from_utf8(out).unwrap(), "line one\nline two\n");
        assert!(diag.is_empty());
    }
}
