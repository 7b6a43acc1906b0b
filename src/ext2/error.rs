//! Error kinds for the volume manager, mirroring the POSIX errno values the command
//! binaries ultimately exit with.

use std::fmt;
use std::io;

/// An error produced by a volume operation.
#[derive(Debug)]
pub enum Error {
    /// A path component, or the target of an operation, does not exist.
    NotFound,
    /// The target of a creating operation already exists.
    Exists,
    /// The target of an operation that requires a non-directory is a directory.
    IsDirectory,
    /// The inode or block bitmap has no free slot left.
    NoSpace,
    /// A `restore` could not recover the requested entry.
    NotRecoverable,
    /// Failure to open or map the image file.
    Io(io::Error),
}

impl Error {
    /// Returns the POSIX errno this error should be reported as, matching §6/§7 of the
    /// specification.
    pub fn errno(&self) -> i32 {
        match self {
            Self::NotFound => libc::ENOENT,
            Self::Exists => libc::EEXIST,
            Self::IsDirectory => libc::EISDIR,
            Self::NoSpace => libc::ENOSPC,
            Self::NotRecoverable => libc::ENOENT,
            Self::Io(_) => libc::EIO,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no such file or directory"),
            Self::Exists => write!(f, "file exists"),
            Self::IsDirectory => write!(f, "is a directory"),
            Self::NoSpace => write!(f, "no space left on device"),
            Self::NotRecoverable => write!(f, "entry could not be recovered"),
            Self::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Shorthand for `Result<T, Error>`, used throughout the volume manager the way
/// `io::Result` is used throughout the teacher's `utils` crate.
pub type Result<T> = std::result::Result<T, Error>;
