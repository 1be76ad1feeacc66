//! Cross-module scenarios exercising the registry, cursor, reconnect, and line-reader together.

use std::cell::Cell;

use stream_core::backend::{
    Backend, ControlCmd, ControlReply, ControlStatus, OpenMode, OpenedStream, StreamFlags,
};
use stream_core::cache::{enable_cache, CacheOptions};
use stream_core::cursor::DEFAULT_BUFFER_SIZE;
use stream_core::errors::Result;
use stream_core::line_reader::{read_line, Encoding};
use stream_core::registry::{BackendDescriptor, NoOptions, StreamRegistry};

/// A backend that only accepts sector-aligned reads and seeks, seeded after open via
/// `ControlCmd::SetContents` (the same pattern `MemoryBackend` uses), so it can be driven
/// entirely through the registry like any real backend.
struct SectorBackend {
    data: Vec<u8>,
    pos: usize,
}

impl SectorBackend {
    fn new() -> Self {
        SectorBackend { data: Vec::new(), pos: 0 }
    }
}

impl Backend for SectorBackend {
    fn open(&mut self, _url: &str, _mode: OpenMode) -> Result<OpenedStream> {
        let mut opened = OpenedStream::new();
        opened.flags = StreamFlags::SEEK | StreamFlags::SEEK_BW;
        opened.sector_size = 512;
        opened.end_pos = self.data.len() as u64;
        Ok(opened)
    }

    fn fill_buffer(&mut self, dst: &mut [u8], len: usize) -> Result<usize> {
        assert_eq!(len, 512, "cursor issued a non-sector-aligned read to the backend");
        let n = len.min(self.data.len() - self.pos);
        dst[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn seek(&mut self, target: u64) -> Result<bool> {
        assert_eq!(target % 512, 0, "cursor issued a non-sector-aligned seek to the backend");
        self.pos = target as usize;
        Ok(true)
    }

    fn control(&mut self, cmd: ControlCmd) -> Result<(ControlStatus, Option<ControlReply>)> {
        match cmd {
            ControlCmd::GetSize => Ok((ControlStatus::Ok, Some(ControlReply::Size(self.data.len() as u64)))),
            ControlCmd::SetContents(bytes) => {
                self.data = bytes.into_vec();
                self.pos = 0;
                Ok((ControlStatus::Ok, Some(ControlReply::Ok)))
            }
            _ => Ok((ControlStatus::Unsupported, None)),
        }
    }

    fn supports_seek(&self) -> bool {
        true
    }
}

#[test]
fn sector_aligned_backend_only_ever_sees_aligned_requests() {
    let data: Vec<u8> = (0u32..4096).map(|i| (i % 256) as u8).collect();

    let mut registry = StreamRegistry::new();
    registry.register(BackendDescriptor {
        name: "sector",
        protocols: &["sector"],
        options: &NoOptions,
        factory: || Box::new(SectorBackend::new()),
    });

    let mut cursor = registry.open_read("sector://").unwrap();
    cursor.control(ControlCmd::SetContents(data.clone().into_boxed_slice())).unwrap();
    cursor.update_size();

    assert!(cursor.seek(700));
    assert_eq!(cursor.tell(), 700);

    let mut buf = [0u8; 16];
    cursor.read(&mut buf);
    assert_eq!(&buf, &data[700..716]);
}

/// A streaming backend that simulates exactly one dropped connection partway through, then
/// resumes normally once reconnected.
struct FlakyBackend {
    data: Vec<u8>,
    pos: usize,
    failed_once: Cell<bool>,
}

impl FlakyBackend {
    fn new() -> Self {
        FlakyBackend { data: Vec::new(), pos: 0, failed_once: Cell::new(false) }
    }
}

impl Backend for FlakyBackend {
    fn open(&mut self, _url: &str, _mode: OpenMode) -> Result<OpenedStream> {
        let mut opened = OpenedStream::new();
        opened.flags = StreamFlags::SEEK | StreamFlags::SEEK_BW | StreamFlags::STREAMING;
        opened.end_pos = self.data.len() as u64;
        Ok(opened)
    }

    fn fill_buffer(&mut self, dst: &mut [u8], len: usize) -> Result<usize> {
        if self.pos >= DEFAULT_BUFFER_SIZE && !self.failed_once.get() {
            self.failed_once.set(true);
            return Ok(0);
        }
        let n = len.min(self.data.len() - self.pos);
        dst[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn seek(&mut self, target: u64) -> Result<bool> {
        self.pos = target as usize;
        Ok(true)
    }

    fn control(&mut self, cmd: ControlCmd) -> Result<(ControlStatus, Option<ControlReply>)> {
        match cmd {
            ControlCmd::Reconnect => Ok((ControlStatus::Ok, None)),
            ControlCmd::GetSize => Ok((ControlStatus::Ok, Some(ControlReply::Size(self.data.len() as u64)))),
            ControlCmd::SetContents(bytes) => {
                self.data = bytes.into_vec();
                self.pos = 0;
                Ok((ControlStatus::Ok, Some(ControlReply::Ok)))
            }
            _ => Ok((ControlStatus::Unsupported, None)),
        }
    }

    fn supports_seek(&self) -> bool {
        true
    }
}

#[test]
fn streaming_backend_recovers_from_one_dropped_connection() {
    let data: Vec<u8> = (0u32..5000).map(|i| (i % 251) as u8).collect();

    let mut registry = StreamRegistry::new();
    registry.register(BackendDescriptor {
        name: "flaky",
        protocols: &["flaky"],
        options: &NoOptions,
        factory: || Box::new(FlakyBackend::new()),
    });

    let mut cursor = registry.open_read("flaky://").unwrap();
    cursor.control(ControlCmd::SetContents(data.clone().into_boxed_slice())).unwrap();
    cursor.update_size();

    let mut total = Vec::new();
    let mut buf = [0u8; 500];
    loop {
        let n = cursor.read(&mut buf);
        if n == 0 {
            break;
        }
        total.extend_from_slice(&buf[..n]);
    }

    assert_eq!(total, data);
}

#[test]
fn cache_wrapped_cursor_is_readable_line_by_line() {
    let mut registry = StreamRegistry::new();
    registry.register(BackendDescriptor {
        name: "memory",
        protocols: &["memory"],
        options: &NoOptions,
        factory: || Box::new(stream_core::backends::memory::MemoryBackend::new()),
    });

    let mut cursor = registry.open_read("memory://").unwrap();
    cursor
        .control(ControlCmd::SetContents(b"one\ntwo\nthree\n".to_vec().into_boxed_slice()))
        .unwrap();
    cursor.update_size();

    let opts = CacheOptions { size_kib: 4, min_fill_percent: 10, seek_limit_percent: 50 };
    let mut cached = enable_cache(cursor, &opts);

    assert_eq!(read_line(&mut cached, Encoding::Utf8, 1024).as_deref(), Some("one\n"));
    assert_eq!(read_line(&mut cached, Encoding::Utf8, 1024).as_deref(), Some("two\n"));
    assert_eq!(read_line(&mut cached, Encoding::Utf8, 1024).as_deref(), Some("three\n"));
}

#[test]
fn skip_past_declared_end_reports_eof() {
    let mut registry = StreamRegistry::new();
    registry.register(BackendDescriptor {
        name: "memory",
        protocols: &["memory"],
        options: &NoOptions,
        factory: || Box::new(stream_core::backends::memory::MemoryBackend::new()),
    });

    let mut cursor = registry.open_read("memory://").unwrap();
    cursor.control(ControlCmd::SetContents(b"0123456789".to_vec().into_boxed_slice())).unwrap();
    cursor.update_size();

    // Larger than 2 * DEFAULT_BUFFER_SIZE so this exercises the seek-near-target-then-read-one-
    // byte trick rather than the small-skip buffer-accumulation path.
    assert!(!cursor.skip(100_000));
    assert!(cursor.eof());
}
