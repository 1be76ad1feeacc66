// Sonata
// Copyright (c) 2019 The Sonata Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Whole-stream slurp (spec §4.G): read an entire stream into memory, growing the destination
//! buffer geometrically instead of requiring the caller to know the size up front.

use crate::cursor::StreamCursor;
use crate::errors::{size_misuse_error, Result};

/// Hard ceiling on `max_size`; larger requests are almost certainly a caller bug, not a
/// legitimately huge file.
const MAX_SIZE_LIMIT: usize = 1_000_000_000;

/// Reads the entirety of `cursor` from its current position, growing the buffer ×1.5 at a time
/// up to `max_size + 1` bytes. Fails if the stream turns out to hold more than `max_size` bytes,
/// or if `max_size` itself exceeds the hard ceiling of 1e9 bytes. If the cursor already knows its
/// `end_pos`, that size is checked against `max_size` up front and used to size the initial
/// buffer, instead of discovering an oversized stream the slow way.
pub fn read_complete(cursor: &mut StreamCursor, max_size: usize) -> Result<Vec<u8>> {
    if max_size > MAX_SIZE_LIMIT {
        return size_misuse_error("read_complete: max_size exceeds the 1e9 byte hard limit");
    }

    let end_pos = cursor.end_pos();
    if end_pos > max_size as u64 {
        return size_misuse_error("read_complete: known stream size exceeds max_size");
    }
    let initial_cap = if end_pos > 0 { (end_pos as usize + 1).min(max_size + 1) } else { 1000.min(max_size + 1) };

    let mut buf = vec![0u8; initial_cap];
    let mut len = 0usize;

    loop {
        if len == buf.len() {
            if buf.len() >= max_size + 1 {
                return size_misuse_error("read_complete: stream exceeds max_size");
            }
            let grown = ((buf.len() as f64) * 1.5).ceil() as usize;
            let new_cap = grown.clamp(buf.len() + 1, max_size + 1);
            buf.resize(new_cap, 0);
        }

        let n = cursor.read_partial(&mut buf[len..]);
        if n == 0 {
            break;
        }
        len += n;
    }

    buf.truncate(len);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ControlCmd, OpenMode};
    use crate::backends::memory::MemoryBackend;

    fn memory_cursor(contents: &[u8]) -> StreamCursor {
        let mut backend = MemoryBackend::new();
        let opened = backend.open("memory://", OpenMode::Read).unwrap();
        let mut cursor = StreamCursor::new("memory://".to_owned(), OpenMode::Read, Box::new(backend), opened);
        cursor.control(ControlCmd::SetContents(contents.to_vec().into_boxed_slice())).unwrap();
        cursor.update_size();
        cursor
    }

    #[test]
    fn reads_small_stream_whole() {
        let mut cursor = memory_cursor(b"the entire message");
        let data = read_complete(&mut cursor, 4096).unwrap();
        assert_eq!(data, b"the entire message");
    }

    #[test]
    fn grows_past_the_initial_buffer() {
        let contents = vec![b'x'; 10_000];
        let mut cursor = memory_cursor(&contents);
        let data = read_complete(&mut cursor, 1_000_000).unwrap();
        assert_eq!(data.len(), 10_000);
    }

    #[test]
    fn fails_when_stream_exceeds_max_size() {
        let contents = vec![b'x'; 2048];
        let mut cursor = memory_cursor(&contents);
        assert!(read_complete(&mut cursor, 1024).is_err());
    }

    #[test]
    fn rejects_max_size_above_hard_limit() {
        let mut cursor = memory_cursor(b"x");
        assert!(read_complete(&mut cursor, MAX_SIZE_LIMIT + 1).is_err());
    }
}
