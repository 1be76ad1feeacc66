// Sonata
// Copyright (c) 2019 The Sonata Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The buffered cursor (spec §4.C): the heart of the core. Presents a uniform buffered,
//! seekable byte interface over whatever [`Backend`] it was opened against.

use std::path::Path;

use log::{error, warn};

use crate::backend::{Backend, ControlCmd, ControlReply, ControlStatus, OpenMode, OpenedStream, StreamFlags};
use crate::capture::CaptureSink;
use crate::errors::Result;
use crate::reconnect;

/// Default raw read size for byte-granular backends (spec §3.1 `read_chunk` base unit).
pub const DEFAULT_BUFFER_SIZE: usize = 2 * 1024;

/// Largest request [`StreamCursor::peek`] will service.
pub const MAX_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// Largest sector size a backend may declare.
pub const MAX_SECTOR_SIZE: usize = 4 * 1024;

/// Capacity of the internal buffer: padded so sector-aligned refills cannot overflow it (spec
/// §3.1 `buffer[]`).
pub const BUFFER_CAPACITY: usize = MAX_BUFFER_SIZE + MAX_SECTOR_SIZE;

/// Outcome of an unbuffered, backend-level seek (spec §4.C.6). Kept as an explicit tri-state
/// rather than one overloaded sentinel value, resolving the "no-op vs. failure" ambiguity the
/// original source left implicit (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SeekOutcome {
    Success,
    /// The target was already the backend's raw position; no seek was issued.
    NoOp,
    Failure,
}

/// A buffered, seekable byte cursor over a [`Backend`] (spec §3.1).
pub struct StreamCursor {
    url: String,
    mode: OpenMode,
    flags: StreamFlags,
    pos: u64,
    end_pos: u64,
    start_pos: u64,
    sector_size: usize,
    read_chunk: usize,
    buffer: Box<[u8]>,
    buf_pos: usize,
    buf_len: usize,
    eof: bool,
    mime_type: Option<String>,
    stream_type: Option<&'static str>,
    uncached_type: Option<&'static str>,
    capture: CaptureSink,
    backend: Box<dyn Backend>,
}

impl StreamCursor {
    pub(crate) fn new(
        url: String,
        mode: OpenMode,
        backend: Box<dyn Backend>,
        opened: OpenedStream,
    ) -> Self {
        StreamCursor {
            url,
            mode,
            flags: opened.flags,
            pos: opened.start_pos,
            end_pos: opened.end_pos,
            start_pos: opened.start_pos,
            sector_size: opened.sector_size,
            read_chunk: opened.read_chunk.unwrap_or(4 * DEFAULT_BUFFER_SIZE),
            buffer: vec![0u8; BUFFER_CAPACITY].into_boxed_slice(),
            buf_pos: 0,
            buf_len: 0,
            eof: false,
            mime_type: opened.mime_type,
            stream_type: opened.stream_type,
            uncached_type: opened.stream_type,
            capture: CaptureSink::new(),
            backend,
        }
    }

    // ---- accessors -----------------------------------------------------------------------

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn flags(&self) -> StreamFlags {
        self.flags
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn stream_type(&self) -> Option<&'static str> {
        self.stream_type
    }

    pub fn uncached_type(&self) -> Option<&'static str> {
        self.uncached_type
    }

    pub fn start_pos(&self) -> u64 {
        self.start_pos
    }

    pub fn end_pos(&self) -> u64 {
        self.end_pos
    }

    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    pub fn read_chunk(&self) -> usize {
        self.read_chunk
    }

    /// §4.C.11: the logical read position visible to callers.
    pub fn tell(&self) -> u64 {
        self.pos - (self.buf_len - self.buf_pos) as u64
    }

    /// Sticky end-of-data hint. Cleared on any successful read or successful seek.
    pub fn eof(&self) -> bool {
        self.eof
    }

    pub(crate) fn buffered_len(&self) -> usize {
        self.buf_len - self.buf_pos
    }

    // ---- §4.C.1: read_unbuffered ----------------------------------------------------------

    /// Invalidates the internal buffer and reads directly from the backend. Never reports an
    /// error to the caller: a non-positive backend result either sets the sticky EOF flag or, on
    /// a streaming backend, triggers one reconnect attempt before doing so (spec §4.C.1).
    pub(crate) fn read_unbuffered(&mut self, dst: &mut [u8], n: usize) -> usize {
        self.buf_pos = 0;
        self.buf_len = 0;

        let mut retried = false;
        loop {
            let len = match self.backend.fill_buffer(dst, n) {
                Ok(len) => len,
                Err(err) => {
                    warn!("[{}] read failed: {}", self.url, err);
                    0
                }
            };

            if len > 0 {
                self.eof = false;
                self.pos += len as u64;
                self.capture.write(&dst[..len]);
                return len;
            }

            // Non-positive result: either this is a genuine, expected end-of-stream, or it's
            // worth trying to reconnect for.
            if self.eof || (self.end_pos != 0 && self.pos == self.end_pos) {
                self.eof = true;
                return 0;
            }

            if retried || !self.reconnect() {
                self.eof = true;
                return 0;
            }

            // Bound the retry to exactly one attempt: set eof now so a second failure in the
            // next loop iteration takes the "genuine EOF" branch above instead of looping.
            self.eof = true;
            retried = true;
        }
    }

    fn reconnect(&mut self) -> bool {
        reconnect::reconnect(self)
    }

    // ---- §4.C.2: fill_buffer ---------------------------------------------------------------

    /// Refills the internal buffer from the backend. Returns the number of bytes read.
    pub fn fill_buffer(&mut self) -> usize {
        let len = if self.sector_size != 0 { self.sector_size } else { DEFAULT_BUFFER_SIZE };

        // The destination for `read_unbuffered` is a slice of `self.buffer`, but that method
        // also needs `&mut self` for its own bookkeeping. Temporarily take the buffer out of
        // `self` to give the borrow checker two disjoint pieces of state.
        let mut buffer = std::mem::replace(&mut self.buffer, Vec::new().into_boxed_slice());
        let read = self.read_unbuffered(&mut buffer[..len], len);
        self.buffer = buffer;

        self.buf_pos = 0;
        self.buf_len = read;
        read
    }

    // ---- §4.C.3: read_partial ---------------------------------------------------------------

    /// Reads up to `dst.len()` bytes. Returns how much data was actually read; `0` means EOF.
    pub fn read_partial(&mut self, dst: &mut [u8]) -> usize {
        let cap = dst.len();

        if self.buf_pos == self.buf_len && cap > 0 {
            self.buf_pos = 0;
            self.buf_len = 0;

            // Bypass the buffer entirely for large, unaligned reads: buffering would only add a
            // copy, not save a syscall.
            if self.sector_size == 0 && cap >= DEFAULT_BUFFER_SIZE {
                return self.read_unbuffered(dst, cap);
            }
            if self.fill_buffer() == 0 {
                return 0;
            }
        }

        let len = cap.min(self.buf_len - self.buf_pos);
        dst[..len].copy_from_slice(&self.buffer[self.buf_pos..self.buf_pos + len]);
        self.buf_pos += len;
        if len > 0 {
            self.eof = false;
        }
        len
    }

    // ---- §4.C.4: read -----------------------------------------------------------------------

    /// Reads until `dst` is full or the backend reaches EOF. A short read is not an error; check
    /// [`StreamCursor::eof`] to distinguish it from a clean full read.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let total = dst.len();
        let mut off = 0;

        while off < total {
            let n = self.read_partial(&mut dst[off..]);
            if n == 0 {
                break;
            }
            off += n;
        }

        if off > 0 {
            self.eof = false;
        }
        off
    }

    // ---- §4.C.5: peek -----------------------------------------------------------------------

    /// Returns a view of up to `n` upcoming bytes without advancing the logical read position.
    /// The view is invalidated by any subsequent cursor operation.
    ///
    /// # Panics
    /// Panics if `n > MAX_BUFFER_SIZE`.
    pub fn peek(&mut self, n: usize) -> &[u8] {
        assert!(n <= MAX_BUFFER_SIZE, "peek() request exceeds MAX_BUFFER_SIZE");

        if self.buf_len - self.buf_pos < n {
            let mut buffer = std::mem::replace(&mut self.buffer, Vec::new().into_boxed_slice());
            buffer.copy_within(self.buf_pos..self.buf_len, 0);
            let mut buf_valid = self.buf_len - self.buf_pos;

            while buf_valid < n {
                let chunk = if self.sector_size != 0 { self.sector_size } else { n - buf_valid };
                let read = self.read_unbuffered(&mut buffer[buf_valid..buf_valid + chunk], chunk);
                if read == 0 {
                    break;
                }
                buf_valid += read;
            }

            self.buffer = buffer;
            self.buf_pos = 0;
            self.buf_len = buf_valid;
            if self.buf_len > 0 {
                self.eof = false;
            }
        }

        let available = n.min(self.buf_len - self.buf_pos);
        &self.buffer[self.buf_pos..self.buf_pos + available]
    }

    // ---- §4.C.6: seek_unbuffered ------------------------------------------------------------

    pub(crate) fn seek_unbuffered(&mut self, target: u64) -> SeekOutcome {
        if target == self.pos {
            return SeekOutcome::NoOp;
        }

        if !self.flags.contains(StreamFlags::SEEK) {
            error!("[{}] cannot seek: stream is not seekable", self.url);
            return SeekOutcome::Failure;
        }

        if target < self.pos && !self.flags.contains(StreamFlags::SEEK_BW) {
            error!("[{}] cannot seek backward in this stream", self.url);
            return SeekOutcome::Failure;
        }

        match self.backend.seek(target) {
            Ok(true) => {
                self.pos = target;
                self.eof = false;
                SeekOutcome::Success
            }
            Ok(false) => {
                error!("[{}] seek failed", self.url);
                SeekOutcome::Failure
            }
            Err(err) => {
                error!("[{}] seek failed: {}", self.url, err);
                SeekOutcome::Failure
            }
        }
    }

    // ---- §4.C.7: seek_long ------------------------------------------------------------------

    fn seek_long(&mut self, target: u64) -> bool {
        let oldpos = self.pos;
        self.buf_pos = 0;
        self.buf_len = 0;
        self.eof = false;

        if self.mode == OpenMode::Write {
            return matches!(self.backend.seek(target), Ok(true));
        }

        let aligned = if self.sector_size != 0 {
            (target / self.sector_size as u64) * self.sector_size as u64
        } else {
            target
        };
        let mut offset = target - aligned;

        match self.seek_unbuffered(aligned) {
            SeekOutcome::NoOp => {
                // The caller should have been able to satisfy this from the buffer already;
                // since it couldn't, report failure rather than silently reinterpreting intent.
                self.pos = oldpos;
                return false;
            }
            SeekOutcome::Failure => {
                while self.pos < aligned {
                    if self.fill_buffer() == 0 {
                        break;
                    }
                }
            }
            SeekOutcome::Success => {}
        }

        loop {
            let n = self.fill_buffer();
            if n == 0 {
                break;
            }
            if offset <= self.buf_len as u64 {
                self.buf_pos = offset as usize;
                self.eof = false;
                return true;
            }
            offset -= self.buf_len as u64;
        }

        // Fill failed, but a seek past EOF is still success at the cursor level; EOF is only
        // observed on the next read.
        self.buf_pos = 0;
        self.buf_len = 0;
        self.eof = false;
        true
    }

    // ---- §4.C.8: seek -----------------------------------------------------------------------

    /// Seeks to an absolute logical position. Negative targets are clamped to `0`. Returns
    /// whether the seek succeeded; a seek that lands past EOF is still a success (see
    /// [`StreamCursor::eof`]).
    pub fn seek(&mut self, target: i64) -> bool {
        let target = if target < 0 {
            error!("[{}] invalid seek to negative position {}", self.url, target);
            0
        } else {
            target as u64
        };

        if target < self.pos {
            let window_start = self.pos - self.buf_len as u64;
            if target >= window_start {
                self.buf_pos = (target - window_start) as usize;
                self.eof = false;
                return true;
            }
        }

        self.seek_long(target)
    }

    // ---- §4.C.9: skip -----------------------------------------------------------------------

    /// Advances (or rewinds, for negative `delta`) the logical read position by `delta` bytes.
    pub fn skip(&mut self, delta: i64) -> bool {
        if delta < 0 {
            let target = self.tell() as i64 + delta;
            return self.seek(target);
        }

        if delta as u64 > 2 * DEFAULT_BUFFER_SIZE as u64 && self.flags.contains(StreamFlags::SEEK_FW) {
            let target = self.tell() + delta as u64;
            // This is the only portable way to distinguish "skip to exactly EOF" from
            // "skip past EOF": seek one byte short of the target, then really read that byte.
            if !self.seek(target as i64 - 1) {
                return false;
            }
            let mut one = [0u8; 1];
            self.read(&mut one);
            return !self.eof() && self.tell() == target;
        }

        let mut remaining = delta as u64;
        while remaining > 0 {
            let mut avail = (self.buf_len - self.buf_pos) as u64;
            if avail == 0 {
                if self.fill_buffer() == 0 {
                    return false;
                }
                avail = (self.buf_len - self.buf_pos) as u64;
            }
            let take = avail.min(remaining);
            self.buf_pos += take as usize;
            remaining -= take;
        }
        true
    }

    // ---- §4.C.10: write_buffer --------------------------------------------------------------

    /// Writes `src` to the backend. A short write is a backend contract violation and is a
    /// fatal error, matching the source's `assert(rd == len)`.
    pub fn write(&mut self, src: &[u8]) -> Result<usize> {
        let len = src.len();
        let written = self.backend.write_buffer(src, len)?;
        self.pos += written as u64;
        assert_eq!(written, len, "backend contract violation: short write ({} of {})", written, len);
        Ok(written)
    }

    // ---- §4.C.11: control / update_size -----------------------------------------------------

    pub fn control(&mut self, cmd: ControlCmd) -> Result<(ControlStatus, Option<ControlReply>)> {
        self.backend.control(cmd)
    }

    /// Queries the backend's size and, if larger than the currently known `end_pos`, enlarges it.
    /// `end_pos` may only grow — important for live streams whose size is discovered over time.
    pub fn update_size(&mut self) {
        if let Ok((ControlStatus::Ok, Some(ControlReply::Size(size)))) = self.control(ControlCmd::GetSize) {
            if size > self.end_pos {
                self.end_pos = size;
            }
        }
    }

    // ---- capture ----------------------------------------------------------------------------

    /// Mirrors every subsequent successful read to `path`. Passing `None` closes any open
    /// capture sink. Setting a new path while one is open closes the previous one first.
    pub fn set_capture(&mut self, path: Option<&Path>) -> std::io::Result<()> {
        self.capture.set(path)
    }

    // ---- crate-internal seams used by reconnect.rs and cache/mod.rs ------------------------

    pub(crate) fn raw_pos(&self) -> u64 {
        self.pos
    }

    pub(crate) fn reset_for_reconnect(&mut self) {
        self.buf_pos = 0;
        self.buf_len = 0;
        self.pos = 0;
        self.eof = true;
    }

    pub(crate) fn backend_control(
        &mut self,
        cmd: ControlCmd,
    ) -> Result<(ControlStatus, Option<ControlReply>)> {
        self.backend.control(cmd)
    }

    pub(crate) fn invalidate_buffer(&mut self) {
        self.buf_pos = 0;
        self.buf_len = 0;
    }
}

impl Drop for StreamCursor {
    fn drop(&mut self) {
        self.backend.close();
    }
}
