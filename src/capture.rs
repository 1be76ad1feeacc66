// Sonata
// Copyright (c) 2019 The Sonata Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The capture tee (spec §4.E): mirrors every byte the cursor successfully reads from the
//! backend to a side file, for diagnostics and bug reports.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use log::warn;

/// An optional side file that every `read_unbuffered` success is mirrored to.
#[derive(Default)]
pub(crate) struct CaptureSink {
    file: Option<File>,
}

impl CaptureSink {
    pub(crate) fn new() -> Self {
        CaptureSink { file: None }
    }

    /// Opens `path` for capture, replacing any previously open capture file. Passing `None`
    /// disables capture.
    pub(crate) fn set(&mut self, path: Option<&Path>) -> io::Result<()> {
        self.file = match path {
            Some(path) => Some(File::create(path)?),
            None => None,
        };
        Ok(())
    }

    /// Mirrors `data` to the capture file, if one is open. A write failure disables capture
    /// rather than propagating: losing the diagnostic copy must never break the primary read
    /// path.
    pub(crate) fn write(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        if let Some(file) = self.file.as_mut() {
            if let Err(err) = file.write_all(data) {
                warn!("capture write failed, disabling capture: {}", err);
                self.file = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disables_on_write_failure() {
        // A sink with no file open is a no-op and never reports failure.
        let mut sink = CaptureSink::new();
        sink.write(b"hello");
        assert!(sink.file.is_none());
    }
}
