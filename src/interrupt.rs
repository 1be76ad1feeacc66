// Sonata
// Copyright (c) 2019 The Sonata Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The process-global interrupt callback (spec §9 design note): a single, optional hook that
//! reconnect waits consult to sleep cooperatively instead of blocking the whole process.
//!
//! Modeled as a once-initialized, read-only-after-init value rather than an unsynchronized
//! mutable global: the callback is registered once at startup (typically by whatever embeds this
//! crate) and never swapped out afterward.

use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// Returns `true` if the wait should be aborted (e.g. the user asked to quit). Boxed rather than
/// a bare `fn` pointer so a caller can close over its own cancellation state (an `Arc<AtomicBool>`,
/// a channel receiver, ...) instead of needing a second ad hoc global to carry `ctx` through.
pub type InterruptCallback = Box<dyn Fn(Duration) -> bool + Send + Sync>;

static INTERRUPT_CALLBACK: OnceLock<InterruptCallback> = OnceLock::new();

/// Registers the process-wide interrupt callback. Only the first call has any effect; later
/// calls are silently ignored, matching the once-initialized design note.
pub fn set_interrupt_callback(callback: InterruptCallback) {
    let _ = INTERRUPT_CALLBACK.set(callback);
}

/// Waits up to `millis`, honoring the registered interrupt callback if one is set. Returns
/// `true` if the wait was cut short by an interrupt request.
pub(crate) fn check_interrupt(millis: u64) -> bool {
    let duration = Duration::from_millis(millis);
    match INTERRUPT_CALLBACK.get() {
        Some(callback) => callback(duration),
        None => {
            thread::sleep(duration);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_plain_sleep_without_a_callback() {
        // With no callback registered this just sleeps briefly and reports no interrupt.
        assert!(!check_interrupt(1));
    }

    #[test]
    fn callback_can_capture_its_own_cancellation_state() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let cancelled = Arc::new(AtomicBool::new(true));
        let captured = Arc::clone(&cancelled);
        let callback: InterruptCallback = Box::new(move |_| captured.load(Ordering::SeqCst));

        assert!(callback(Duration::from_millis(0)));
    }
}
