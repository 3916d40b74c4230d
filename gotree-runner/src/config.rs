// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for gotree.

use crate::errors::{ConfigParseError, ConfigParseErrorKind, MaxRunsParseError};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{fmt, str::FromStr, sync::LazyLock, time::Duration};

/// Overall configuration for gotree.
///
/// Configuration is layered: the defaults embedded in the binary, then
/// `.config/gotree.toml` in the root directory if it exists, then a file passed in explicitly.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExplorerConfig {
    go: GoConfig,
    discovery: DiscoveryConfig,
    run: RunConfig,
}

impl ExplorerConfig {
    /// The default location of the config within the root directory.
    pub const CONFIG_PATH: &'static str = ".config/gotree.toml";

    /// Contains the default config as a TOML file.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config from the given file, or if not specified from `.config/gotree.toml` in
    /// the root directory.
    ///
    /// If no config file is specified and the root doesn't have `.config/gotree.toml`, uses the
    /// default config options.
    pub fn from_sources(
        root_dir: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = root_dir.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(config_file, kind))
    }

    /// Parses a config from a TOML string layered over the defaults.
    pub fn from_toml_str(
        config_file: impl Into<Utf8PathBuf>,
        contents: &str,
    ) -> Result<Self, ConfigParseError> {
        let builder =
            Self::make_default_config().add_source(File::from_str(contents, FileFormat::Toml));
        Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(config_file, kind))
    }

    /// Returns the default gotree config.
    pub fn default_config() -> Self {
        let config = Self::make_default_config()
            .build()
            .expect("default config is always valid");
        config
            .try_deserialize()
            .expect("default config is always valid")
    }

    /// Returns the program invoked for discovery and execution.
    pub fn program(&self) -> &str {
        &self.go.program
    }

    /// Returns extra arguments passed to `go test`.
    pub fn extra_args(&self) -> &[String] {
        &self.go.extra_args
    }

    /// Returns the prefix used to recognize test names in the listing stream.
    pub fn test_prefix(&self) -> &str {
        &self.discovery.test_prefix
    }

    /// Returns the pattern passed to `go test -list`.
    pub fn list_pattern(&self) -> &str {
        &self.discovery.list_pattern
    }

    /// Returns the maximum number of test subprocesses to run simultaneously.
    pub fn max_concurrent_runs(&self) -> MaxConcurrentRuns {
        self.run.max_concurrent_runs
    }

    /// Returns the time after which a run without a verdict is killed, if any.
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run.run_timeout
    }

    /// Overrides the program invoked for discovery and execution.
    pub fn set_program(&mut self, program: impl Into<String>) -> &mut Self {
        self.go.program = program.into();
        self
    }

    /// Overrides the maximum number of concurrent runs.
    pub fn set_max_concurrent_runs(&mut self, max: MaxConcurrentRuns) -> &mut Self {
        self.run.max_concurrent_runs = max;
        self
    }

    /// Overrides the run timeout.
    pub fn set_run_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.run.run_timeout = timeout;
        self
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<Self, ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        serde_path_to_error::deserialize(config)
            .map_err(|error| ConfigParseErrorKind::DeserializeError(Box::new(error)))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct GoConfig {
    program: String,
    #[serde(default)]
    extra_args: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DiscoveryConfig {
    #[serde(deserialize_with = "deserialize_test_prefix")]
    test_prefix: String,
    list_pattern: String,
}

// An empty prefix would turn every line of listing output into a test.
fn deserialize_test_prefix<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let prefix = String::deserialize(deserializer)?;
    if prefix.is_empty() {
        return Err(serde::de::Error::invalid_value(
            serde::de::Unexpected::Str(&prefix),
            &"a non-empty test name prefix",
        ));
    }
    Ok(prefix)
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RunConfig {
    max_concurrent_runs: MaxConcurrentRuns,
    #[serde(default, with = "humantime_serde")]
    run_timeout: Option<Duration>,
}

/// Type for the `max-concurrent-runs` config key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MaxConcurrentRuns {
    /// Run this many test subprocesses at a time.
    Count(usize),

    /// Run as many test subprocesses as there are logical CPUs.
    NumCpus,
}

impl MaxConcurrentRuns {
    /// Gets the actual number of concurrent runs computed at runtime. Always at least 1.
    pub fn compute(self) -> usize {
        static NUM_CPUS: LazyLock<usize> =
            LazyLock::new(|| match std::thread::available_parallelism() {
                Ok(count) => count.get(),
                Err(error) => {
                    tracing::warn!("unable to determine number of CPUs: {error}");
                    1
                }
            });

        match self {
            Self::Count(count) => count.max(1),
            Self::NumCpus => *NUM_CPUS,
        }
    }
}

impl FromStr for MaxConcurrentRuns {
    type Err = MaxRunsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "num-cpus" {
            return Ok(Self::NumCpus);
        }
        match s.parse::<usize>() {
            Ok(count) if count > 0 => Ok(Self::Count(count)),
            _ => Err(MaxRunsParseError::new(s)),
        }
    }
}

impl fmt::Display for MaxConcurrentRuns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(count) => write!(f, "{count}"),
            Self::NumCpus => write!(f, "num-cpus"),
        }
    }
}

impl<'de> Deserialize<'de> for MaxConcurrentRuns {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = MaxConcurrentRuns;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a positive integer or the string \"num-cpus\"")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse().map_err(|_| {
                    serde::de::Error::invalid_value(serde::de::Unexpected::Str(v), &self)
                })
            }

            // Note that TOML uses i64, not u64.
            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match usize::try_from(v) {
                    Ok(count) if count > 0 => Ok(MaxConcurrentRuns::Count(count)),
                    _ => Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Signed(v),
                        &self,
                    )),
                }
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match usize::try_from(v) {
                    Ok(count) if count > 0 => Ok(MaxConcurrentRuns::Count(count)),
                    _ => Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Unsigned(v),
                        &self,
                    )),
                }
            }
        }

        deserializer.deserialize_any(V)
    }
}
