// Sonata
// Copyright (c) 2019 The Sonata Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A uniform, seekable, byte-oriented I/O core for media players.
//!
//! A [`registry::StreamRegistry`] resolves a URL to a [`backend::Backend`] and hands back a
//! [`cursor::StreamCursor`]: a buffered cursor that every other part of a player reads and seeks
//! through, regardless of whether the bytes are coming from a local file, a network socket, or
//! memory. [`cache`] optionally interposes a read-ahead thread in front of any cursor.

pub mod backend;
pub mod backends;
pub mod cache;
mod capture;
pub mod cursor;
pub mod errors;
pub mod interrupt;
pub mod line_reader;
mod reconnect;
pub mod registry;
pub mod slurp;

use backends::{file::FileBackend, memory::MemoryBackend, null::NullBackend};
use registry::{BackendDescriptor, NoOptions, StreamRegistry};

/// Builds a registry wired with the backends this crate ships: `file://` and bare paths, an
/// in-memory backend for `memory://`, and a null backend for `null://`. Order matters: the file
/// backend's empty-prefix entry only matches URLs without a `://`, so it must not shadow the
/// others.
pub fn default_registry() -> StreamRegistry {
    let mut registry = StreamRegistry::new();

    registry.register(BackendDescriptor {
        name: "memory",
        protocols: &["memory"],
        options: &NoOptions,
        factory: || Box::new(MemoryBackend::new()),
    });

    registry.register(BackendDescriptor {
        name: "null",
        protocols: &["null"],
        options: &NoOptions,
        factory: || Box::new(NullBackend::new()),
    });

    registry.register(BackendDescriptor {
        name: "file",
        protocols: &["file", ""],
        options: &NoOptions,
        factory: || Box::new(FileBackend::new()),
    });

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ControlCmd;

    #[test]
    fn default_registry_opens_memory_stream() {
        let registry = default_registry();
        let mut cursor = registry.open_read("memory://").unwrap();
        cursor.control(ControlCmd::SetContents(b"hello".to_vec().into_boxed_slice())).unwrap();
        cursor.update_size();

        let mut buf = [0u8; 5];
        assert_eq!(cursor.read(&mut buf), 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn default_registry_rejects_unknown_protocol() {
        let registry = default_registry();
        assert!(registry.open_read("rtmp://example.com/stream").is_err());
    }
}
