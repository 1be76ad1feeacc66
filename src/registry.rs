// Sonata
// Copyright (c) 2019 The Sonata Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The backend registry and URL dispatch (spec §4.B): an ordered list of backend descriptors,
//! resolved against a URL's protocol prefix. The registry is the only constructor path for a
//! [`StreamCursor`](crate::cursor::StreamCursor).

use std::any::Any;

use log::{error, warn};

use crate::backend::{Backend, OpenMode, OpenedStream, StreamFlags};
use crate::cursor::{StreamCursor, DEFAULT_BUFFER_SIZE};
use crate::errors::{protocol_mismatch_error, Error, Result};

/// Parses a URL-shaped option string against a backend's opaque option schema (spec §6.1). The
/// syntax itself is out of scope for this core; only the narrow seam is specified here.
pub trait OptionParser {
    fn parse(&self, url: &str) -> Result<Box<dyn Any>>;
}

/// An `OptionParser` for backends with an empty option schema.
pub struct NoOptions;

impl OptionParser for NoOptions {
    fn parse(&self, _url: &str) -> Result<Box<dyn Any>> {
        Ok(Box::new(()))
    }
}

/// A factory that builds a fresh, unopened backend instance.
pub type BackendFactory = fn() -> Box<dyn Backend>;

/// An immutable record describing a transport backend (spec §3.2).
pub struct BackendDescriptor {
    pub name: &'static str,
    /// Case-insensitive protocol prefixes this backend claims (e.g. `"http"`, `"memory"`). An
    /// empty string means "matches anything without `://`".
    pub protocols: &'static [&'static str],
    pub options: &'static (dyn OptionParser + Sync),
    pub factory: BackendFactory,
}

fn prefix_matches(prefix: &str, url: &str) -> bool {
    if prefix.is_empty() {
        return !url.contains("://");
    }
    let plen = prefix.len();
    url.len() >= plen + 3
        && url[..plen].eq_ignore_ascii_case(prefix)
        && &url[plen..plen + 3] == "://"
}

/// An ordered list of backend descriptors. Order encodes dispatch priority: the first
/// descriptor whose protocol list matches `url`, and whose `open` does not return
/// `Unsupported`, wins.
#[derive(Default)]
pub struct StreamRegistry {
    descriptors: Vec<BackendDescriptor>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        StreamRegistry { descriptors: Vec::new() }
    }

    /// Append a backend descriptor. Descriptors are tried in registration order.
    pub fn register(&mut self, desc: BackendDescriptor) {
        self.descriptors.push(desc);
    }

    /// Resolve and open `url` for reading.
    pub fn open_read(&self, url: &str) -> Result<StreamCursor> {
        self.open(url, OpenMode::Read)
    }

    /// Resolve and open `url` for writing.
    pub fn open_write(&self, url: &str) -> Result<StreamCursor> {
        self.open(url, OpenMode::Write)
    }

    /// The six-step dispatch algorithm of spec §4.B.
    fn open(&self, url: &str, mode: OpenMode) -> Result<StreamCursor> {
        for desc in &self.descriptors {
            if desc.protocols.is_empty() {
                warn!("backend '{}' has an empty protocol list, skipping it", desc.name);
                continue;
            }

            let matched = desc.protocols.iter().any(|p| prefix_matches(p, url));
            if !matched {
                continue;
            }

            // Step 3: parse URL-options against the descriptor's schema. Failure aborts dispatch
            // entirely rather than falling through to the next backend.
            let _opts = desc.options.parse(url)?;

            let mut backend = (desc.factory)();
            match backend.open(url, mode) {
                Ok(opened) => {
                    return Ok(self.finish_open(url, mode, backend, opened));
                }
                Err(Error::Unsupported(reason)) => {
                    // Step 5: this backend declined; keep scanning.
                    let _ = reason;
                    continue;
                }
                Err(err) => {
                    // Step 6: any other error aborts dispatch with failure.
                    error!("backend '{}' failed to open '{}': {}", desc.name, url, err);
                    return Err(err);
                }
            }
        }

        protocol_mismatch_error(url)
    }

    /// Step 4: post-process a successfully opened backend into a ready [`StreamCursor`].
    fn finish_open(
        &self,
        url: &str,
        mode: OpenMode,
        backend: Box<dyn Backend>,
        mut opened: OpenedStream,
    ) -> StreamCursor {
        if opened.read_chunk.is_none() {
            let granularity = opened.sector_size.max(DEFAULT_BUFFER_SIZE);
            opened.read_chunk = Some(4 * granularity);
        }

        if !backend.supports_seek() {
            opened.flags.remove(StreamFlags::SEEK);
        }

        StreamCursor::new(url.to_owned(), mode, backend, opened)
    }
}
