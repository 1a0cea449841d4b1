use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidCommand(String),

    #[error("invalid argument: command is {len} bytes, limit is {limit}")]
    CommandTooLong { len: usize, limit: usize },

    #[error("transfer failed: {0}")]
    Transfer(#[from] io::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("process {0} has no address space")]
    NoAddressSpace(i32),

    #[error("os error: {0}")]
    Os(#[from] nix::Error),

    #[error("can't open endpoint {}: {source}", .path.display())]
    Endpoint { path: PathBuf, source: io::Error },
}

impl Error {
    /// Errors that mean "the thing asked about isn't there". These end up in
    /// the report text instead of failing the write.
    pub fn is_soft(&self) -> bool {
        match self {
            Error::NotFound(_) | Error::NoAddressSpace(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_errors() {
        assert!(Error::NotFound("pid 7".to_string()).is_soft());
        assert!(Error::NoAddressSpace(2).is_soft());
        assert!(!Error::InvalidCommand("x".to_string()).is_soft());
        assert!(!Error::CommandTooLong { len: 9, limit: 4 }.is_soft());
    }

    #[test]
    fn messages_name_the_problem() {
        let e = Error::CommandTooLong { len: 5000, limit: 4096 };
        assert_eq!(e.to_string(), "invalid argument: command is 5000 bytes, limit is 4096");
        assert_eq!(Error::NoAddressSpace(2).to_string(), "process 2 has no address space");
    }
}
