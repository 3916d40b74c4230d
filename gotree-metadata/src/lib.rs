// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Machine-readable types shared between gotree components.
//!
//! The main type in this crate is [`TestEventRecord`], one line of the stream produced by
//! `go test -json`.

mod events;
mod exit_codes;

pub use events::*;
pub use exit_codes::*;
