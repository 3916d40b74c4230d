// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::Result;
use gotree_runner::{config::ExplorerConfig, session::ExplorerContext};
use std::{fs, os::unix::fs::PermissionsExt, sync::Once, time::Duration};

pub(crate) fn test_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // Other tests in this binary may have installed these already.
        let _ = color_eyre::install();
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

pub(crate) const PKG_A: &str = "example.com/m/a";
pub(crate) const PKG_B: &str = "example.com/m/b";

/// A `go` stand-in that lists a fixed set of tests and answers `-run` for each of them.
///
/// `$3` is the anchored `-run` pattern for executions.
pub(crate) static FAKE_GO: &str = r#"
if [ "$2" != "-run" ]; then
  cat <<'EOF'
{"Action":"start","Package":"example.com/m/a"}
{"Action":"output","Package":"example.com/m/a","Output":"TestPass\n"}
{"Action":"output","Package":"example.com/m/a","Output":"TestSkip\n"}
{"Action":"output","Package":"example.com/m/a","Output":"TestIncomplete\n"}
{"Action":"output","Package":"example.com/m/a","Output":"ok  \texample.com/m/a\t0.001s\n"}
{"Action":"pass","Package":"example.com/m/a","Elapsed":0.001}
{"Action":"output","Package":"example.com/m/b","Output":"TestGarbage\n"}
{"Action":"output","Package":"example.com/m/b","Output":"TestSlow\n"}
{"Action":"output","Package":"example.com/m/b","Output":"TestSubtests\n"}
{"Action":"pass","Package":"example.com/m/b","Elapsed":0.001}
EOF
  exit 0
fi

case "$3" in
'^TestPass$')
  cat <<'EOF'
{"Action":"start","Package":"example.com/m/a"}
{"Action":"run","Package":"example.com/m/a","Test":"TestPass"}
{"Action":"output","Package":"example.com/m/a","Test":"TestPass","Output":"ok\n"}
{"Action":"pass","Package":"example.com/m/a","Test":"TestPass","Elapsed":0}
{"Action":"output","Package":"example.com/m/a","Output":"PASS\n"}
{"Action":"pass","Package":"example.com/m/a","Elapsed":0.002}
EOF
  ;;
'^TestSkip$')
  cat <<'EOF'
{"Action":"run","Package":"example.com/m/a","Test":"TestSkip"}
{"Action":"output","Package":"example.com/m/a","Test":"TestSkip","Output":"--- SKIP: TestSkip (0.00s)\n"}
{"Action":"skip","Package":"example.com/m/a","Test":"TestSkip","Elapsed":0}
EOF
  ;;
'^TestIncomplete$')
  cat <<'EOF'
{"Action":"run","Package":"example.com/m/a","Test":"TestIncomplete"}
{"Action":"output","Package":"example.com/m/a","Test":"TestIncomplete","Output":"=== RUN   TestIncomplete\n"}
EOF
  echo 'panic: boom' >&2
  exit 2
  ;;
'^TestGarbage$')
  echo '{"Action":"run","Package":"example.com/m/b","Test":"TestGarbage"}'
  echo 'this is not a test event'
  ;;
'^TestSlow$')
  echo '{"Action":"run","Package":"example.com/m/b","Test":"TestSlow"}'
  exec sleep 30
  ;;
'^TestSubtests$')
  cat <<'EOF'
{"Action":"output","Package":"example.com/m/b","Test":"TestSubtests","Output":"=== RUN   TestSubtests\n"}
{"Action":"output","Package":"example.com/m/b","Test":"TestSubtests/one","Output":"    sub_test.go:9: one failed\n"}
{"Action":"fail","Package":"example.com/m/b","Test":"TestSubtests/one","Elapsed":0}
{"Action":"output","Package":"example.com/m/b","Test":"TestSubtestsOther","Output":"not mine\n"}
{"Action":"output","Package":"example.com/m/b","Test":"TestSubtests","Output":"--- FAIL: TestSubtests (0.00s)\n"}
{"Action":"fail","Package":"example.com/m/b","Test":"TestSubtests","Elapsed":0}
EOF
  exit 1
  ;;
*)
  echo "unexpected arguments: $*" >&2
  exit 3
  ;;
esac
"#;

/// A `go` stand-in whose test runs never produce a verdict and outlive their event stream.
pub(crate) static LINGERING_GO: &str = r#"
if [ "$2" != "-run" ]; then
  cat <<'EOF'
{"Action":"output","Package":"example.com/m/a","Output":"TestClosesStdout\n"}
{"Action":"output","Package":"example.com/m/a","Output":"TestHoldsStderr\n"}
EOF
  exit 0
fi

case "$3" in
'^TestClosesStdout$')
  echo '{"Action":"run","Package":"example.com/m/a","Test":"TestClosesStdout"}'
  exec 1>&-
  exec sleep 10
  ;;
'^TestHoldsStderr$')
  echo '{"Action":"run","Package":"example.com/m/a","Test":"TestHoldsStderr"}'
  sleep 10 >/dev/null &
  exit 1
  ;;
esac
"#;

/// A temporary directory containing an executable `go` stand-in.
pub(crate) struct FakeGo {
    dir: Utf8TempDir,
}

impl FakeGo {
    pub(crate) fn new(script: &str) -> Result<Self> {
        let dir = Utf8TempDir::new()?;
        let program = dir.path().join("go");
        fs::write(&program, format!("#!/bin/sh\n{script}"))?;
        fs::set_permissions(&program, fs::Permissions::from_mode(0o755))?;
        Ok(Self { dir })
    }

    pub(crate) fn root_dir(&self) -> &Utf8Path {
        self.dir.path()
    }

    pub(crate) fn context(&self) -> ExplorerContext {
        self.context_with_timeout(None)
    }

    pub(crate) fn context_with_timeout(&self, timeout: Option<Duration>) -> ExplorerContext {
        let mut config = ExplorerConfig::default_config();
        config
            .set_program(self.dir.path().join("go").into_string())
            .set_run_timeout(timeout);
        ExplorerContext::new(
            self.dir.path(),
            ExplorerContext::DEFAULT_SCOPE,
            config,
        )
    }
}
