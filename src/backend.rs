// Sonata
// Copyright (c) 2019 The Sonata Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The backend contract (spec §4.A): the abstract vtable every transport implements.
//!
//! A `Backend` only needs to provide `open`; every other capability has a default
//! implementation that reports `Unsupported`. The absence of a capability, rather than a
//! null-checked function pointer, is what tells the cursor what a backend can do —
//! `StreamFlags::SEEK` is derived from whether `seek` was overridden when `open` didn't set it
//! explicitly, following the capability-enum-via-trait-object design note in spec §9.

use crate::errors::Result;

bitflags::bitflags! {
    /// Capabilities and behavioural hints a backend advertises about itself (spec §3.1 `flags`).
    pub struct StreamFlags: u32 {
        /// The backend supports arbitrary seeks (forward and backward).
        const SEEK = 0b0001;
        /// The backend supports only forward seeks.
        const SEEK_FW = 0b0010;
        /// The backend supports backward seeks.
        const SEEK_BW = 0b0100;
        /// The backend is a live connection eligible for reconnect on transient failure.
        const STREAMING = 0b1000;
    }
}

/// The mode a cursor was opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

/// Typed out-of-band query/command channel (spec §4.A).
pub enum ControlCmd {
    /// Query the total size of the stream, if known.
    GetSize,
    /// Ask a streaming backend to re-establish its connection.
    Reconnect,
    /// Install a byte slice as the content of a memory-backed stream.
    SetContents(Box<[u8]>),
    /// Ask whether the backend manages its own chapter/timeline information.
    ManagesTimeline,
}

/// The reply to a successful `control` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlReply {
    /// Acknowledged with no payload.
    Ok,
    /// Acknowledged with a size, in reply to `ControlCmd::GetSize`.
    Size(u64),
}

/// Status of a `control` call that did not hard-error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlStatus {
    Ok,
    Unsupported,
}

/// Attributes a backend's `open` populates on the cursor it is being attached to (spec §3.1,
/// §3.4). Kept as a plain value type rather than letting `open` reach into the cursor directly,
/// since the backend does not otherwise own or see the cursor's buffer.
#[derive(Debug, Clone, Default)]
pub struct OpenedStream {
    pub flags: StreamFlags,
    /// Atomic read granularity imposed by the backend; 0 means byte-granular.
    pub sector_size: usize,
    /// Preferred raw read size. `None` lets the registry apply the default.
    pub read_chunk: Option<usize>,
    pub mime_type: Option<String>,
    pub stream_type: Option<&'static str>,
    /// Logical origin of the stream (nonzero for some media).
    pub start_pos: u64,
    /// Known end-of-stream offset, 0 if unknown.
    pub end_pos: u64,
}

impl OpenedStream {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The abstract vtable every transport backend implements (spec §4.A).
///
/// `fill_buffer` returns `Ok(0)` on EOF and `Err` on error (never a negative count — unlike the C
/// source this enumerates failure through `Result`, but a positive return may still be a partial
/// read); `seek` and `write_buffer` follow the same convention.
pub trait Backend {
    /// Populate and return the cursor attributes the backend wants to start with. Called exactly
    /// once, by the registry, immediately after a protocol-prefix match.
    fn open(&mut self, url: &str, mode: OpenMode) -> Result<OpenedStream>;

    /// Fill `dst[..len]` with fresh bytes. Returns the number of bytes actually read; `Ok(0)`
    /// means end-of-stream. The default implementation reports the backend as read-incapable.
    fn fill_buffer(&mut self, dst: &mut [u8], len: usize) -> Result<usize> {
        let _ = (dst, len);
        crate::errors::unsupported_error("backend does not support reading")
    }

    /// Seek the backend's raw position to `target`. Returns whether the seek succeeded.
    fn seek(&mut self, target: u64) -> Result<bool> {
        let _ = target;
        Ok(false)
    }

    /// Write `src[..len]` to the backend. Returns the number of bytes actually written.
    fn write_buffer(&mut self, src: &[u8], len: usize) -> Result<usize> {
        let _ = (src, len);
        crate::errors::unsupported_error("backend does not support writing")
    }

    /// Handle a typed out-of-band command.
    fn control(&mut self, cmd: ControlCmd) -> Result<(ControlStatus, Option<ControlReply>)> {
        let _ = cmd;
        Ok((ControlStatus::Unsupported, None))
    }

    /// Whether this backend overrides `seek`. Used by the registry to derive
    /// `StreamFlags::SEEK` when `open` did not already set it explicitly.
    fn supports_seek(&self) -> bool {
        false
    }

    /// Release any resources held by the backend. Called once when the owning cursor is dropped.
    fn close(&mut self) {}
}
