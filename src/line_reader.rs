// Sonata
// Copyright (c) 2019 The Sonata Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Line-oriented reads over a [`StreamCursor`] (spec §4.F), with UTF-8 and UTF-16 transcoding.
//! Built on `peek`/`skip` so a partially-read line never disturbs the cursor's position.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::cursor::StreamCursor;

/// Text encoding of the underlying bytes a line is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl Encoding {
    fn unit_size(self) -> usize {
        match self {
            Encoding::Utf8 => 1,
            Encoding::Utf16Le | Encoding::Utf16Be => 2,
        }
    }
}

/// Finds the first line-feed code unit in `buf`, returning its byte offset. `buf` is assumed to
/// hold a whole number of code units for `encoding`.
fn find_newline(buf: &[u8], encoding: Encoding) -> Option<usize> {
    match encoding {
        Encoding::Utf8 => buf.iter().position(|&b| b == b'\n'),
        Encoding::Utf16Le => buf.chunks_exact(2).position(|pair| LittleEndian::read_u16(pair) == 0x000A).map(|i| i * 2),
        Encoding::Utf16Be => buf.chunks_exact(2).position(|pair| BigEndian::read_u16(pair) == 0x000A).map(|i| i * 2),
    }
}

fn decode(buf: &[u8], encoding: Encoding) -> String {
    match encoding {
        Encoding::Utf8 => String::from_utf8_lossy(buf).into_owned(),
        Encoding::Utf16Le | Encoding::Utf16Be => {
            let mut units = Vec::with_capacity(buf.len() / 2);
            for pair in buf.chunks_exact(2) {
                let unit = match encoding {
                    Encoding::Utf16Le => LittleEndian::read_u16(pair),
                    Encoding::Utf16Be => BigEndian::read_u16(pair),
                    Encoding::Utf8 => unreachable!(),
                };
                units.push(unit);
            }
            String::from_utf16_lossy(&units)
        }
    }
}

/// Reads one line, growing the lookahead window geometrically until a line-feed is found, EOF is
/// hit, or `max_len` raw bytes have been examined without one. The returned text includes the
/// line-feed itself when one was found. Returns `None` only when nothing at all could be read
/// (clean EOF at the start of the line).
pub fn read_line(cursor: &mut StreamCursor, encoding: Encoding, max_len: usize) -> Option<String> {
    let unit = encoding.unit_size();
    let mut window = (unit * 64).max(unit);

    loop {
        let window_clamped = window.min(max_len);
        let peeked = cursor.peek(window_clamped).to_vec();

        if let Some(nl_offset) = find_newline(&peeked, encoding) {
            let consumed = nl_offset + unit;
            cursor.skip(consumed as i64);
            return Some(decode(&peeked[..consumed], encoding));
        }

        let hit_eof = peeked.len() < window_clamped;
        let hit_cap = window_clamped >= max_len;

        if hit_eof || hit_cap {
            if peeked.is_empty() {
                return None;
            }
            cursor.skip(peeked.len() as i64);
            return Some(decode(&peeked, encoding));
        }

        window = (window * 2).min(max_len);
    }
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
    fn reads_utf8_lines_including_the_newline() {
        let mut cursor = memory_cursor(b"first\r\nsecond\nthird");
        assert_eq!(read_line(&mut cursor, Encoding::Utf8, 4096).as_deref(), Some("first\r\n"));
        assert_eq!(read_line(&mut cursor, Encoding::Utf8, 4096).as_deref(), Some("second\n"));
        assert_eq!(read_line(&mut cursor, Encoding::Utf8, 4096).as_deref(), Some("third"));
        assert_eq!(read_line(&mut cursor, Encoding::Utf8, 4096), None);
    }

    #[test]
    fn reads_utf16_le_line() {
        let mut raw = Vec::new();
        for ch in "hi".encode_utf16() {
            raw.extend_from_slice(&ch.to_le_bytes());
        }
        raw.extend_from_slice(&0x000Au16.to_le_bytes());
        for ch in "there".encode_utf16() {
            raw.extend_from_slice(&ch.to_le_bytes());
        }

        let mut cursor = memory_cursor(&raw);
        assert_eq!(read_line(&mut cursor, Encoding::Utf16Le, 4096).as_deref(), Some("hi\n"));
        assert_eq!(read_line(&mut cursor, Encoding::Utf16Le, 4096).as_deref(), Some("there"));
    }

    #[test]
    fn scenario_utf16_le_newline_is_included() {
        // `0x48 00 65 00 0A 00 77 00` -> "He\n" followed by 'w'.
        let raw = [0x48, 0x00, 0x65, 0x00, 0x0A, 0x00, 0x77, 0x00];
        let mut cursor = memory_cursor(&raw);
        assert_eq!(read_line(&mut cursor, Encoding::Utf16Le, 32).as_deref(), Some("He\n"));
    }

    #[test]
    fn respects_max_len_without_a_newline() {
        let mut cursor = memory_cursor(b"0123456789");
        assert_eq!(read_line(&mut cursor, Encoding::Utf8, 4).as_deref(), Some("0123"));
    }
}
