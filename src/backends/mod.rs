// Sonata
// Copyright (c) 2019 The Sonata Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A minimal set of concrete backends (spec §6.2): enough to exercise and test the core without
//! depending on any particular media player's full transport stack.

pub mod file;
pub mod memory;
pub mod null;
