// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests that run discovery and test runs against a stand-in `go` program.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod discovery;
        mod fixtures;
        mod run;
    }
}
