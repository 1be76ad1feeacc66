// Sonata
// Copyright (c) 2019 The Sonata Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The null backend: always at EOF on read, discards everything on write. Useful as a reference
//! implementation of the minimal `Backend` surface and as a sink in tests.

use crate::backend::{Backend, ControlCmd, ControlReply, ControlStatus, OpenMode, OpenedStream, StreamFlags};
use crate::errors::Result;

pub struct NullBackend {
    written: u64,
}

impl NullBackend {
    pub fn new() -> Self {
        NullBackend { written: 0 }
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for NullBackend {
    fn open(&mut self, _url: &str, mode: OpenMode) -> Result<OpenedStream> {
        let mut opened = OpenedStream::new();
        if mode == OpenMode::Read {
            opened.flags = StreamFlags::SEEK;
        }
        Ok(opened)
    }

    fn fill_buffer(&mut self, _dst: &mut [u8], _len: usize) -> Result<usize> {
        Ok(0)
    }

    fn seek(&mut self, _target: u64) -> Result<bool> {
        Ok(true)
    }

    fn write_buffer(&mut self, _src: &[u8], len: usize) -> Result<usize> {
        self.written += len as u64;
        Ok(len)
    }

    fn control(&mut self, cmd: ControlCmd) -> Result<(ControlStatus, Option<ControlReply>)> {
        match cmd {
            ControlCmd::GetSize => Ok((ControlStatus::Ok, Some(ControlReply::Size(0)))),
            _ => Ok((ControlStatus::Unsupported, None)),
        }
    }

    fn supports_seek(&self) -> bool {
        true
    }
}
