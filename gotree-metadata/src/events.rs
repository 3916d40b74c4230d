// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A single record from the stream produced by `go test -json`.
///
/// Field names follow the test2json format, which uses Go-style capitalized keys. Fields that
/// gotree doesn't understand (for example `FailedBuild` or `ImportPath` on newer toolchains) are
/// ignored.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TestEventRecord {
    /// The time at which the event was produced, if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<FixedOffset>>,

    /// The kind of event.
    pub action: TestAction,

    /// The import path of the package this event belongs to.
    ///
    /// Some toolchain-level records omit this field, in which case it is empty.
    #[serde(default)]
    pub package: String,

    /// The test this event belongs to, or `None` for package-level events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,

    /// Elapsed time in seconds, for `pass` and `fail` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<f64>,

    /// An output fragment, for `output` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl TestEventRecord {
    /// Creates a new record with the given action and package, and no other fields set.
    pub fn new(action: TestAction, package: impl Into<String>) -> Self {
        Self {
            time: None,
            action,
            package: package.into(),
            test: None,
            elapsed: None,
            output: None,
        }
    }

    /// Sets the test identifier for this record.
    pub fn with_test(mut self, test: impl Into<String>) -> Self {
        self.test = Some(test.into());
        self
    }

    /// Sets the output fragment for this record.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// The action tag of a [`TestEventRecord`].
///
/// Tags not known to gotree deserialize to [`TestAction::Unknown`] rather than failing, so that
/// newer toolchains don't break older consumers.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TestAction {
    /// The test binary is about to be executed.
    Start,
    /// A test has started running.
    Run,
    /// A test has been paused.
    Pause,
    /// A paused test has continued running.
    Cont,
    /// Output was printed.
    Output,
    /// A test or package passed.
    Pass,
    /// A test or package failed.
    Fail,
    /// A test or package was skipped.
    Skip,
    /// A benchmark printed log output but did not fail.
    Bench,
    /// Any other tag.
    Unknown,
}

impl TestAction {
    /// Returns the tag for this action as it appears in the event stream.
    ///
    /// [`TestAction::Unknown`] is rendered as `"unknown"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Run => "run",
            Self::Pause => "pause",
            Self::Cont => "cont",
            Self::Output => "output",
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Skip => "skip",
            Self::Bench => "bench",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a tag, mapping anything unrecognized to [`TestAction::Unknown`].
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "start" => Self::Start,
            "run" => Self::Run,
            "pause" => Self::Pause,
            "cont" => Self::Cont,
            "output" => Self::Output,
            "pass" => Self::Pass,
            "fail" => Self::Fail,
            "skip" => Self::Skip,
            "bench" => Self::Bench,
            _ => Self::Unknown,
        }
    }

    /// Returns true if this action carries a verdict for the test or package it names.
    pub fn is_verdict(self) -> bool {
        matches!(self, Self::Pass | Self::Fail | Self::Skip)
    }
}

impl fmt::Display for TestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TestAction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from_tag(&tag))
    }
}

impl Serialize for TestAction {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}
