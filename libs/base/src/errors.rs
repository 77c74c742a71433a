// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! Error codes shared by every server reply and client call.
//!
//! Mirrors the errno-shaped space in spec §7: every failing operation
//! carries one of these codes, negated, as the reply's `errcode`.

use std::fmt;

/// The error codes used throughout the workspace.
///
/// Values are deliberately not the real POSIX errno numbers: only their
/// relative distinctness matters on the wire, since clients never compare
/// them against libc's `errno.h` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Code {
    Success = 0,
    /// Malformed argument.
    Inval,
    /// No such name, file, or slot.
    NoEnt,
    /// Duplicate entry.
    Exists,
    /// Resource (cache line, buffer) is pinned.
    Busy,
    /// Would block under a no-wait request.
    Again,
    /// Queue or pool is full.
    NoSpace,
    /// No free page/frame.
    NoMem,
    /// Bad file descriptor.
    BadFd,
    /// Too many open files for this process.
    TooManyFiles,
    /// Too many open files, system-wide.
    TooManyFilesSystem,
    /// Access denied.
    Access,
    /// File would exceed the maximum representable size.
    TooBig,
    /// Path component name too long.
    NameTooLong,
    /// Operation not supported.
    NotSup,
    /// Operation not permitted.
    Perm,
    /// No such message of the requested type.
    NoMsg,
}

impl Code {
    /// Short mnemonic, used in log lines and reply traces.
    pub const fn as_str(self) -> &'static str {
        match self {
            Code::Success => "SUCCESS",
            Code::Inval => "EINVAL",
            Code::NoEnt => "ENOENT",
            Code::Exists => "EEXIST",
            Code::Busy => "EBUSY",
            Code::Again => "EAGAIN",
            Code::NoSpace => "ENOSPC",
            Code::NoMem => "ENOMEM",
            Code::BadFd => "EBADF",
            Code::TooManyFiles => "EMFILE",
            Code::TooManyFilesSystem => "ENFILE",
            Code::Access => "EACCES",
            Code::TooBig => "EFBIG",
            Code::NameTooLong => "ENAMETOOLONG",
            Code::NotSup => "ENOTSUP",
            Code::Perm => "EPERM",
            Code::NoMsg => "ENOMSG",
        }
    }
}

impl Default for Code {
    fn default() -> Self {
        Code::Success
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error type passed around by every fallible operation in the
/// workspace.
///
/// Carries a [`Code`] plus an optional free-form message for diagnostics;
/// only the code crosses the wire.
#[derive(Debug, Clone)]
pub struct Error {
    code: Code,
    msg: Option<String>,
}

impl Error {
    pub fn new(code: Code) -> Self {
        Error { code, msg: None }
    }

    pub fn with_msg(code: Code, msg: impl Into<String>) -> Self {
        Error {
            code,
            msg: Some(msg.into()),
        }
    }

    pub fn code(&self) -> Code {
        self.code
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.msg {
            Some(m) => write!(f, "{}: {}", self.code, m),
            None => write!(f, "{}", self.code),
        }
    }
}

impl std::error::Error for Error {}

impl From<Code> for Error {
    fn from(code: Code) -> Self {
        Error::new(code)
    }
}

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;
