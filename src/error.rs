use thiserror::Error;

/// Every failure the core can produce, from a missing path component to a
/// wedged KV adapter. Mapped to POSIX errno values at the gateway boundary
/// via [`Error::errno`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("no such file or directory")]
    NoEntry,
    #[error("permission denied")]
    NoAccess,
    #[error("operation not permitted")]
    NotPermitted,
    #[error("file exists")]
    Exists,
    #[error("not a directory")]
    NotDirectory,
    #[error("directory not empty")]
    NotEmpty,
    #[error("file or directory too large")]
    TooLarge,
    #[error("too many open files")]
    TooManyOpen,
    #[error("bad file handle")]
    BadHandle,
    #[error("internal filesystem error: {0}")]
    Internal(String),
}

impl Error {
    /// Map to the POSIX errno a FUSE-style gateway would return to the kernel.
    pub fn errno(&self) -> i32 {
        match self {
            Error::NoEntry => libc::ENOENT,
            Error::NoAccess => libc::EACCES,
            Error::NotPermitted => libc::EPERM,
            Error::Exists => libc::EEXIST,
            Error::NotDirectory => libc::ENOTDIR,
            Error::NotEmpty => libc::ENOTEMPTY,
            Error::TooLarge => libc::EFBIG,
            Error::TooManyOpen => libc::ENFILE,
            Error::BadHandle => libc::EBADF,
            Error::Internal(_) => libc::EIO,
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
