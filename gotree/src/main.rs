// Copyright (c) The gotree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::Parser;
use color_eyre::Result;
use gotree::{GotreeApp, OutputWriter};

fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = enable_ansi_support::enable_ansi_support();

    let opts = GotreeApp::parse();
    let output = match opts.init_output() {
        Ok(output) => output,
        Err(error) => {
            // Logging isn't set up, so there's nothing better than plain stderr.
            eprintln!("error: {}", error.display_chain());
            std::process::exit(error.process_exit_code())
        }
    };

    match opts.exec(output, &mut OutputWriter::default()) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            error.display_to_stderr(&output.stderr_styles());
            std::process::exit(error.process_exit_code())
        }
    }
}
