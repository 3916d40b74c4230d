// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decoding of the `go test -json` event stream.
//!
//! Streams are decoded one line at a time, as the subprocess produces them, so that state changes
//! can be shown as soon as they happen rather than after the process exits.

use crate::errors::DecodeError;
use gotree_metadata::{TestAction, TestEventRecord};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

/// An incremental decoder over an asynchronous, line-oriented event stream.
///
/// After the first error, the stream is considered done and subsequent calls return `None`.
#[derive(Debug)]
pub struct EventStream<R> {
    lines: Lines<R>,
    line_number: usize,
    done: bool,
}

impl<R: AsyncBufRead + Unpin> EventStream<R> {
    /// Creates a new decoder over the given reader.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
            done: false,
        }
    }

    /// Returns the next event in the stream, or `None` at the end of the stream.
    ///
    /// This is cancel-safe to the extent that [`Lines::next_line`] is.
    pub async fn next_event(&mut self) -> Option<Result<TestEventRecord, DecodeError>> {
        if self.done {
            return None;
        }

        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(error) => {
                    self.done = true;
                    return Some(Err(DecodeError::Read {
                        line_number: self.line_number,
                        error,
                    }));
                }
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            let res = decode_line(self.line_number, &line);
            if res.is_err() {
                self.done = true;
            }
            return Some(res);
        }
    }
}

/// Decodes an in-memory stream.
///
/// The returned iterator is lazy, and each call to this function starts over from the beginning
/// of `input`. Decoding stops after the first error.
pub fn decode_str(input: &str) -> impl Iterator<Item = Result<TestEventRecord, DecodeError>> + '_ {
    let mut failed = false;
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map_while(move |(index, line)| {
            if failed {
                return None;
            }
            let res = decode_line(index + 1, line);
            failed = res.is_err();
            Some(res)
        })
}

fn decode_line(line_number: usize, line: &str) -> Result<TestEventRecord, DecodeError> {
    serde_json::from_str(line).map_err(|error| DecodeError::Parse {
        line_number,
        line: line.to_owned(),
        error,
    })
}

/// Helpers for interpreting records.
pub trait TestEventRecordExt {
    /// If this is an output event whose fragment names a test by the listing convention, returns
    /// the test name with surrounding whitespace removed.
    ///
    /// The convention is a plain prefix match, so helper output that happens to start with the
    /// prefix is misclassified as a test name.
    fn listed_test_name(&self, prefix: &str) -> Option<&str>;

    /// Returns true if this event is about exactly the given test in the given package.
    fn is_for_test(&self, package: &str, test: &str) -> bool;

    /// Returns true if this event is about the given test or one of its subtests.
    fn is_for_test_or_subtest(&self, package: &str, test: &str) -> bool;
}

impl TestEventRecordExt for TestEventRecord {
    fn listed_test_name(&self, prefix: &str) -> Option<&str> {
        if self.action != TestAction::Output {
            return None;
        }
        let output = self.output.as_deref()?;
        if !output.starts_with(prefix) {
            return None;
        }
        let name = output.trim();
        (!name.is_empty()).then_some(name)
    }

    fn is_for_test(&self, package: &str, test: &str) -> bool {
        self.package == package && self.test.as_deref() == Some(test)
    }

    fn is_for_test_or_subtest(&self, package: &str, test: &str) -> bool {
        if self.package != package {
            return false;
        }
        match self.test.as_deref() {
            Some(name) => match name.strip_prefix(test) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
            None => false,
        }
    }
}
