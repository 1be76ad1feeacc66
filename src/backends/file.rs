// Sonata
// Copyright (c) 2019 The Sonata Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The local file backend (spec §6.2): `file://` and bare-path URLs, backed directly by
//! `std::fs::File`.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::backend::{Backend, ControlCmd, ControlReply, ControlStatus, OpenMode, OpenedStream, StreamFlags};
use crate::errors::Result;

pub struct FileBackend {
    file: Option<std::fs::File>,
}

impl FileBackend {
    pub fn new() -> Self {
        FileBackend { file: None }
    }

    fn path_from_url(url: &str) -> &str {
        url.strip_prefix("file://").unwrap_or(url)
    }
}

impl Default for FileBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for FileBackend {
    fn open(&mut self, url: &str, mode: OpenMode) -> Result<OpenedStream> {
        let path = Self::path_from_url(url);
        let file = match mode {
            OpenMode::Read => OpenOptions::new().read(true).open(path)?,
            OpenMode::Write => OpenOptions::new().write(true).create(true).truncate(true).open(path)?,
        };
        let len = file.metadata()?.len();
        self.file = Some(file);

        let mut opened = OpenedStream::new();
        opened.flags = StreamFlags::SEEK | StreamFlags::SEEK_BW;
        opened.end_pos = len;
        Ok(opened)
    }

    fn fill_buffer(&mut self, dst: &mut [u8], len: usize) -> Result<usize> {
        let file = self.file.as_mut().expect("fill_buffer called before open");
        Ok(file.read(&mut dst[..len])?)
    }

    fn seek(&mut self, target: u64) -> Result<bool> {
        let file = self.file.as_mut().expect("seek called before open");
        file.seek(SeekFrom::Start(target))?;
        Ok(true)
    }

    fn write_buffer(&mut self, src: &[u8], len: usize) -> Result<usize> {
        let file = self.file.as_mut().expect("write_buffer called before open");
        Ok(file.write(&src[..len])?)
    }

    fn control(&mut self, cmd: ControlCmd) -> Result<(ControlStatus, Option<ControlReply>)> {
        match cmd {
            ControlCmd::GetSize => {
                let file = self.file.as_ref().expect("control called before open");
                let len = file.metadata()?.len();
                Ok((ControlStatus::Ok, Some(ControlReply::Size(len))))
            }
            _ => Ok((ControlStatus::Unsupported, None)),
        }
    }

    fn supports_seek(&self) -> bool {
        true
    }
}
