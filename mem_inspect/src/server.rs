use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::Shutdown;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::procfs::Resolver;
use crate::session::Session;

// Anyone may query; the daemon holds the privilege.
const SOCKET_MODE: u32 = 0o666;

/// One line read from a client, or the length of one that was too long.
#[derive(Debug, PartialEq, Eq)]
enum Request {
    Line(Vec<u8>),
    Oversized(usize),
}

/// Serves the endpoint: every connection gets its own session.
pub struct Server<R: Resolver + 'static> {
    listener: UnixListener,
    resolver: Arc<R>,
    config: ServiceConfig,
}

impl<R: Resolver + 'static> Server<R> {
    pub fn bind(config: ServiceConfig, resolver: R) -> Result<Server<R>> {
        let path = &config.socket_path;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        clear_stale_socket(path)?;
        let listener = UnixListener::bind(path).map_err(|source| Error::Endpoint {
            path: path.clone(),
            source,
        })?;
        fs::set_permissions(path, fs::Permissions::from_mode(SOCKET_MODE))?;
        info!("Listening on {}", path.display());
        Ok(Server {
            listener,
            resolver: Arc::new(resolver),
            config,
        })
    }

    /// Accepts connections until the listener fails.
    pub fn run(&self) -> Result<()> {
        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Accept failed: {}", e);
                    continue;
                }
            };
            let resolver = Arc::clone(&self.resolver);
            let limit = self.config.max_command_len;
            let timeout = self.config.session_timeout;
            thread::spawn(move || {
                if let Err(e) = serve_connection(stream, &*resolver, limit, timeout) {
                    error!("Session ended with error: {}", e);
                }
            });
        }
        Ok(())
    }
}

impl<R: Resolver + 'static> Drop for Server<R> {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.config.socket_path) {
            debug!("Can't remove {}: {}", self.config.socket_path.display(), e);
        }
    }
}

/// Removes a socket left behind by a daemon that is gone. Anything else at
/// `path` is left alone and refused: a regular file, or a socket some other
/// process still accepts on.
fn clear_stale_socket(path: &Path) -> Result<()> {
    let refuse = |kind: io::ErrorKind, why: &str| Error::Endpoint {
        path: path.to_path_buf(),
        source: io::Error::new(kind, why.to_string()),
    };
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if !meta.file_type().is_socket() {
        return Err(refuse(io::ErrorKind::AlreadyExists, "path exists and is not a socket"));
    }
    if UnixStream::connect(path).is_ok() {
        return Err(refuse(io::ErrorKind::AddrInUse, "another server is listening"));
    }
    warn!("Removing stale socket {}", path.display());
    fs::remove_file(path)?;
    Ok(())
}

/// Runs one session over a connected socket. A client that stays silent
/// for longer than `timeout` loses its session.
pub fn serve_connection<R: Resolver + ?Sized>(
    stream: UnixStream,
    resolver: &R,
    limit: usize,
    timeout: Option<Duration>,
) -> Result<()> {
    stream.set_read_timeout(timeout)?;
    let reader = stream.try_clone()?;
    let mut session = Session::new(resolver, limit);
    serve(reader, &stream, &mut session)?;
    if let Err(e) = stream.shutdown(Shutdown::Write) {
        debug!("Shutdown after report failed: {}", e);
    }
    Ok(())
}

/// Applies every command line from `input` to the session, answering
/// rejected ones with an `error:` line, then writes the report once the
/// client is done writing.
pub fn serve<I, O, R>(input: I, mut output: O, session: &mut Session<'_, R>) -> Result<()>
where
    I: Read,
    O: Write,
    R: Resolver + ?Sized,
{
    let mut reader = BufReader::new(input);
    loop {
        let limit = session.max_command_len();
        let rejected = match next_request(&mut reader, limit)? {
            None => break,
            Some(Request::Oversized(len)) => Some(Error::CommandTooLong { len, limit }),
            Some(Request::Line(line)) => session.write(&line).err(),
        };
        if let Some(e) = rejected {
            warn!("Rejected write: {}", e);
            writeln!(output, "error: {}", e)?;
        }
    }
    output.write_all(session.read().as_bytes())?;
    output.flush()?;
    Ok(())
}

/// Reads the next line, at most `limit` bytes of it not counting the line
/// terminator. A longer line is consumed up to its newline and reported as
/// oversized.
fn next_request<B: BufRead>(reader: &mut B, limit: usize) -> io::Result<Option<Request>> {
    let mut line = Vec::new();
    // Room for the command plus "\r\n".
    let read = reader.by_ref().take(limit as u64 + 2).read_until(b'\n', &mut line)?;
    if read == 0 {
        return Ok(None);
    }
    let terminated = line.last() == Some(&b'\n');
    if terminated {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    if line.len() <= limit {
        return Ok(Some(Request::Line(line)));
    }
    let mut len = read;
    if !terminated {
        loop {
            let (done, used) = {
                let buf = reader.fill_buf()?;
                if buf.is_empty() {
                    (true, 0)
                } else {
                    match buf.iter().position(|&b| b == b'\n') {
                        Some(pos) => (true, pos + 1),
                        None => (false, buf.len()),
                    }
                }
            };
            reader.consume(used);
            len += used;
            if done {
                break;
            }
        }
    }
    Ok(Some(Request::Oversized(len)))
}
