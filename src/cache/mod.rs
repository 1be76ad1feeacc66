// Sonata
// Copyright (c) 2019 The Sonata Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The cache interposer (spec §4.H): wraps a cursor with a second cursor whose backend reads
//! ahead on a background thread into a shared buffer, so a slow or high-latency inner transport
//! doesn't stall every read.
//!
//! The inner cursor becomes exclusively owned by the producer thread once wrapped; the outer
//! cursor's owning thread never touches it directly again, only through the shared buffer.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use log::warn;

use crate::backend::{Backend, ControlCmd, ControlReply, ControlStatus, OpenMode, OpenedStream, StreamFlags};
use crate::cursor::{StreamCursor, DEFAULT_BUFFER_SIZE};
use crate::errors::Result;

/// Tuning knobs for [`enable_cache`] (spec §4.H).
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    /// Total size of the read-ahead buffer, in KiB.
    pub size_kib: u32,
    /// Percentage of `size_kib` that must be buffered before the very first read is let through.
    pub min_fill_percent: u8,
    /// How far ahead of the buffered window (in percent of `size_kib`) a forward seek may land
    /// and still be served by reading forward instead of discarding the window.
    pub seek_limit_percent: u8,
}

impl Default for CacheOptions {
    fn default() -> Self {
        CacheOptions { size_kib: 64 * 1024, min_fill_percent: 20, seek_limit_percent: 50 }
    }
}

struct CacheState {
    buf: Vec<u8>,
    /// Absolute stream offset that `buf[0]` corresponds to.
    base_pos: u64,
    /// Index into `buf` of the next unread byte.
    consumed: usize,
    /// Set once `buf.len() >= min_fill` or EOF is reached, gating the very first read.
    primed: bool,
    /// A seek the producer must service by repositioning the inner cursor and discarding `buf`.
    target_seek: Option<u64>,
    eof: bool,
    stopped: bool,
    capacity: usize,
    min_fill: usize,
    seek_limit: u64,
}

struct CacheShared {
    state: Mutex<CacheState>,
    cv: Condvar,
}

/// Wraps `cursor` with a read-ahead cache, per [`CacheOptions`]. Read-only streams only: a
/// write-mode cursor, or one whose cache thread fails to start, is handed back unchanged.
pub fn enable_cache(cursor: StreamCursor, opts: &CacheOptions) -> StreamCursor {
    if cursor.mode() != OpenMode::Read {
        return cursor;
    }

    let mut cursor = cursor;
    cursor.invalidate_buffer();

    let capacity = ((opts.size_kib as usize) * 1024).max(DEFAULT_BUFFER_SIZE);
    let min_fill = capacity * (opts.min_fill_percent.min(100) as usize) / 100;
    let seek_limit = (capacity as u64) * (opts.seek_limit_percent.min(100) as u64) / 100;

    let url = cursor.url().to_owned();
    let mime_type = cursor.mime_type().map(|s| s.to_owned());
    let stream_type = cursor.stream_type();
    let start_pos = cursor.start_pos();
    let end_pos = cursor.end_pos();

    let shared = Arc::new(CacheShared {
        state: Mutex::new(CacheState {
            buf: Vec::new(),
            base_pos: start_pos,
            consumed: 0,
            primed: min_fill == 0,
            target_seek: None,
            eof: false,
            stopped: false,
            capacity,
            min_fill,
            seek_limit,
        }),
        cv: Condvar::new(),
    });

    let inner = Arc::new(Mutex::new(cursor));
    let inner_for_thread = Arc::clone(&inner);
    let shared_for_thread = Arc::clone(&shared);

    let spawned = thread::Builder::new()
        .name("stream-cache-producer".into())
        .spawn(move || producer_loop(inner_for_thread, shared_for_thread));

    let producer = match spawned {
        Ok(handle) => handle,
        Err(err) => {
            warn!("[{}] failed to start cache producer thread, caching disabled: {}", url, err);
            // The thread never ran: only one strong reference to `inner` remains, so this
            // recovers the original, untouched cursor to hand back to the caller.
            return Arc::try_unwrap(inner)
                .unwrap_or_else(|_| unreachable!("producer thread failed to spawn but still holds a reference"))
                .into_inner()
                .unwrap();
        }
    };

    let backend = CacheBackend { inner, shared, producer: Some(producer) };

    let mut opened = OpenedStream::new();
    opened.flags = StreamFlags::SEEK;
    opened.mime_type = mime_type;
    opened.stream_type = stream_type;
    opened.start_pos = start_pos;
    opened.end_pos = end_pos;

    StreamCursor::new(url, OpenMode::Read, Box::new(backend), opened)
}

fn producer_loop(inner: Arc<Mutex<StreamCursor>>, shared: Arc<CacheShared>) {
    loop {
        let seek_target = {
            let mut st = shared.state.lock().unwrap();
            st.target_seek.take()
        };

        if let Some(target) = seek_target {
            let landed = inner.lock().unwrap().seek(target as i64);
            let mut st = shared.state.lock().unwrap();
            st.buf.clear();
            st.consumed = 0;
            st.base_pos = if landed { target } else { st.base_pos };
            st.eof = false;
            st.primed = st.min_fill == 0;
            shared.cv.notify_all();
            continue;
        }

        {
            let mut st = shared.state.lock().unwrap();
            // Gate on unread-ahead bytes, not total buffered length: `buf` also retains already-
            // consumed history (so backward seeks never touch the backend), and that history only
            // grows. Gating on `buf.len()` directly would latch "full" forever once history alone
            // passed `capacity`.
            while !st.stopped && st.target_seek.is_none() && (st.eof || st.buf.len() - st.consumed >= st.capacity) {
                st = shared.cv.wait(st).unwrap();
            }
            if st.stopped {
                return;
            }
            if st.target_seek.is_some() {
                continue;
            }
        }

        let mut chunk = vec![0u8; DEFAULT_BUFFER_SIZE];
        let n = inner.lock().unwrap().read(&mut chunk);

        let mut st = shared.state.lock().unwrap();
        if st.target_seek.is_some() {
            // A seek arrived while we were reading; this chunk belongs to the old position.
            continue;
        }
        if n == 0 {
            st.eof = true;
        } else {
            st.buf.extend_from_slice(&chunk[..n]);
        }
        if !st.primed && (st.buf.len() >= st.min_fill || st.eof) {
            st.primed = true;
        }
        shared.cv.notify_all();
    }
}

struct CacheBackend {
    inner: Arc<Mutex<StreamCursor>>,
    shared: Arc<CacheShared>,
    producer: Option<JoinHandle<()>>,
}

impl CacheBackend {
    fn hard_seek(&self, mut st: MutexGuard<CacheState>, target: u64) -> bool {
        st.target_seek = Some(target);
        st.primed = false;
        self.shared.cv.notify_all();
        let st = self.shared.cv.wait_while(st, |s| !s.stopped && s.target_seek.is_some()).unwrap();
        st.base_pos == target && st.consumed == 0
    }
}

impl Backend for CacheBackend {
    fn open(&mut self, _url: &str, _mode: OpenMode) -> Result<OpenedStream> {
        unreachable!("CacheBackend is only ever constructed pre-opened by enable_cache")
    }

    fn fill_buffer(&mut self, dst: &mut [u8], len: usize) -> Result<usize> {
        let mut st = self.shared.state.lock().unwrap();
        st = self.shared.cv.wait_while(st, |s| !s.stopped && !s.primed).unwrap();
        st = self
            .shared
            .cv
            .wait_while(st, |s| !s.stopped && s.consumed >= s.buf.len() && !s.eof)
            .unwrap();

        let avail = st.buf.len() - st.consumed;
        let n = avail.min(len);
        dst[..n].copy_from_slice(&st.buf[st.consumed..st.consumed + n]);
        st.consumed += n;
        self.shared.cv.notify_all();
        Ok(n)
    }

    fn seek(&mut self, target: u64) -> Result<bool> {
        let mut st = self.shared.state.lock().unwrap();
        let window_end = st.base_pos + st.buf.len() as u64;

        if target >= st.base_pos && target <= window_end {
            st.consumed = (target - st.base_pos) as usize;
            return Ok(true);
        }

        if target > window_end && target - window_end <= st.seek_limit {
            st = self
                .shared
                .cv
                .wait_while(st, |s| !s.stopped && !s.eof && s.base_pos + s.buf.len() as u64 < target)
                .unwrap();
            let window_end = st.base_pos + st.buf.len() as u64;
            let landed = target.min(window_end);
            st.consumed = (landed - st.base_pos) as usize;
            return Ok(landed == target);
        }

        Ok(self.hard_seek(st, target))
    }

    fn control(&mut self, cmd: ControlCmd) -> Result<(ControlStatus, Option<ControlReply>)> {
        match cmd {
            ControlCmd::GetSize => self.inner.lock().unwrap().control(ControlCmd::GetSize),
            other => self.inner.lock().unwrap().control(other),
        }
    }

    fn supports_seek(&self) -> bool {
        true
    }

    fn close(&mut self) {
        {
            let mut st = self.shared.state.lock().unwrap();
            st.stopped = true;
        }
        self.shared.cv.notify_all();
        if let Some(handle) = self.producer.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CacheBackend {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ControlCmd as Cmd;
    use crate::backends::memory::MemoryBackend;

    fn memory_cursor(contents: &[u8]) -> StreamCursor {
        let mut backend = MemoryBackend::new();
        let opened = backend.open("memory://", OpenMode::Read).unwrap();
        let mut cursor = StreamCursor::new("memory://".to_owned(), OpenMode::Read, Box::new(backend), opened);
        cursor.control(Cmd::SetContents(contents.to_vec().into_boxed_slice())).unwrap();
        cursor.update_size();
        cursor
    }

    #[test]
    fn cached_read_matches_uncached_read() {
        let data = vec![7u8; 500_000];
        let cursor = memory_cursor(&data);
        let opts = CacheOptions { size_kib: 64, min_fill_percent: 10, seek_limit_percent: 50 };
        let mut cached = enable_cache(cursor, &opts);

        let mut out = vec![0u8; data.len()];
        let n = cached.read(&mut out);
        assert_eq!(n, data.len());
        assert_eq!(out, data);
    }

    #[test]
    fn cache_disabled_for_write_mode() {
        let mut backend = MemoryBackend::new();
        let opened = backend.open("memory://", OpenMode::Write).unwrap();
        let cursor = StreamCursor::new("memory://".to_owned(), OpenMode::Write, Box::new(backend), opened);
        let opts = CacheOptions::default();
        let wrapped = enable_cache(cursor, &opts);
        assert_eq!(wrapped.mode(), OpenMode::Write);
    }

    #[test]
    fn seek_within_cached_window_works() {
        let data: Vec<u8> = (0u8..=255).cycle().take(200_000).collect();
        let cursor = memory_cursor(&data);
        let opts = CacheOptions { size_kib: 256, min_fill_percent: 5, seek_limit_percent: 50 };
        let mut cached = enable_cache(cursor, &opts);

        let mut probe = [0u8; 16];
        cached.read(&mut probe);
        assert!(cached.seek(10));
        let mut buf = [0u8; 8];
        cached.read(&mut buf);
        assert_eq!(&buf, &data[10..18]);
    }
}
