// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! An interactive explorer for Go test suites.
//!
//! gotree lists the tests reachable from a directory with `go test -list`, shows them grouped by
//! package, and runs the ones you pick, showing status and output as results stream in. The
//! `list` and `run` subcommands do the same without a terminal UI.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;
mod reporter;
mod ui;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter};
