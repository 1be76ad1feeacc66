// Sonata
// Copyright (c) 2019 The Sonata Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An in-memory backend (spec §6.2): a stream whose contents are installed directly via
//! `ControlCmd::SetContents`, used for tests and for callers that already hold the data.

use crate::backend::{
    Backend, ControlCmd, ControlReply, ControlStatus, OpenMode, OpenedStream, StreamFlags,
};
use crate::errors::Result;

pub struct MemoryBackend {
    data: Vec<u8>,
    pos: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend { data: Vec::new(), pos: 0 }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn open(&mut self, _url: &str, _mode: OpenMode) -> Result<OpenedStream> {
        let mut opened = OpenedStream::new();
        opened.flags = StreamFlags::SEEK | StreamFlags::SEEK_BW | StreamFlags::SEEK_FW;
        opened.end_pos = self.data.len() as u64;
        Ok(opened)
    }

    fn fill_buffer(&mut self, dst: &mut [u8], len: usize) -> Result<usize> {
        let n = len.min(self.data.len() - self.pos);
        dst[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn seek(&mut self, target: u64) -> Result<bool> {
        if target as usize <= self.data.len() {
            self.pos = target as usize;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn write_buffer(&mut self, src: &[u8], len: usize) -> Result<usize> {
        let end = self.pos + len;
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(&src[..len]);
        self.pos = end;
        Ok(len)
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
