// Sonata
// Copyright (c) 2019 The Sonata Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::error;
use std::fmt;
use std::io;
use std::result;

/// `Error` enumerates every way a backend, the registry, or the cursor can fail. Outcomes that
/// are not failures from the caller's point of view (short reads, seeks landing past EOF, a
/// no-op seek) are deliberately not represented here; they are reported through plain
/// `bool`/tri-state return values instead.
#[derive(Debug)]
pub enum Error {
    /// The backend's underlying transport reported an I/O failure.
    Io(io::Error),
    /// The operation is not supported by this backend or in the stream's current state (e.g. a
    /// seek on a forward-only stream, or a `control` command the backend does not implement).
    Unsupported(&'static str),
    /// No registered backend claimed the URL.
    ProtocolMismatch(String),
    /// A backend's option schema rejected the URL-shaped option string.
    OptionParse(String),
    /// A backend violated its contract with the cursor (e.g. a short write).
    ContractViolation(&'static str),
    /// A caller-supplied size parameter was outside of the documented safe range.
    SizeMisuse(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Unsupported(what) => write!(f, "unsupported: {}", what),
            Error::ProtocolMismatch(url) => write!(f, "no backend accepted url: {}", url),
            Error::OptionParse(msg) => write!(f, "option parse failed: {}", msg),
            Error::ContractViolation(what) => write!(f, "backend contract violation: {}", what),
            Error::SizeMisuse(what) => write!(f, "invalid size argument: {}", what),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create an unsupported-operation error.
pub fn unsupported_error<T>(what: &'static str) -> Result<T> {
    Err(Error::Unsupported(what))
}

/// Convenience function to create a protocol-mismatch error.
pub fn protocol_mismatch_error<T>(url: &str) -> Result<T> {
    Err(Error::ProtocolMismatch(url.to_owned()))
}

/// Convenience function to create an option-parse error.
pub fn option_parse_error<T>(msg: &str) -> Result<T> {
    Err(Error::OptionParse(msg.to_owned()))
}

/// Convenience function to create a size-misuse error.
pub fn size_misuse_error<T>(what: &'static str) -> Result<T> {
    Err(Error::SizeMisuse(what))
}
