// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for gotree, an interactive explorer for Go test suites.
//!
//! The basic flow is:
//!
//! 1. [`discovery::discover`] runs `go test -list` and builds a [`catalog::Catalog`].
//! 2. The presentation layer renders the catalog, and the user marks entries through a
//!    [`selection::SelectionSet`].
//! 3. A [`runner::RunDispatcher`] runs each marked entry in its own `go test` subprocess.
//! 4. Run state and output flow back through the [`bridge`] and are applied to the catalog on the
//!    presentation thread.
//!
//! [`session::Session`] ties these together behind the callbacks a presentation layer invokes.

pub mod bridge;
pub mod catalog;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod events;
pub mod runner;
pub mod selection;
pub mod session;
pub mod test_command;
