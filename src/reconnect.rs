// Sonata
// Copyright (c) 2019 The Sonata Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The reconnect protocol (spec §4.D): bounded retry for streaming backends that drop their
//! connection mid-read.

use log::warn;

use crate::backend::{ControlCmd, ControlStatus, StreamFlags};
use crate::cursor::{SeekOutcome, StreamCursor};
use crate::interrupt;

/// Maximum number of reconnect attempts before giving up.
const MAX_RECONNECT_RETRIES: u32 = 5;

/// Backoff between attempts, honoring the process interrupt callback.
const RECONNECT_SLEEP_MS: u64 = 1000;

/// Attempts to re-establish a dropped connection and restore the cursor to its pre-failure
/// position. Only applies to backends advertising `StreamFlags::STREAMING`; any other backend
/// gives up immediately.
pub(crate) fn reconnect(cursor: &mut StreamCursor) -> bool {
    if !cursor.flags().contains(StreamFlags::STREAMING) {
        return false;
    }

    let target = cursor.raw_pos();

    for attempt in 0..MAX_RECONNECT_RETRIES {
        warn!("[{}] connection lost, reconnect attempt {}/{}", cursor.url(), attempt + 1, MAX_RECONNECT_RETRIES);

        if attempt > 0 && interrupt::check_interrupt(RECONNECT_SLEEP_MS) {
            return false;
        }

        cursor.reset_for_reconnect();

        match cursor.backend_control(ControlCmd::Reconnect) {
            Ok((ControlStatus::Unsupported, _)) => return false,
            Ok((ControlStatus::Ok, _)) => {}
            Err(_) => continue,
        }

        let outcome = cursor.seek_unbuffered(target);
        if matches!(outcome, SeekOutcome::Success | SeekOutcome::NoOp) && cursor.raw_pos() == target {
            return true;
        }
    }

    false
}
