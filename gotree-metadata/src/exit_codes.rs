// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `gotree` failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum GotreeExitCode {}

impl GotreeExitCode {
    /// No errors occurred and gotree exited normally.
    pub const OK: i32 = 0;

    /// No tests were selected to run, but no other errors occurred.
    pub const NO_TESTS_RUN: i32 = 4;

    /// Reading configuration or otherwise preparing the session failed.
    pub const SETUP_ERROR: i32 = 96;

    /// One or more tests failed.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// Discovering the list of tests failed.
    pub const DISCOVERY_FAILED: i32 = 104;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// The interactive terminal session could not be set up or failed while running.
    pub const INTERACTIVE_ERROR: i32 = 112;
}
