//! detect - client for an image object-detection service
//!
//! See `detect --help`. Logging follows `RUST_LOG` (default `info`).

use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    detect_client::cli::run()
}
