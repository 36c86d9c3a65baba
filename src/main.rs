//! Kodegen Bundler Modpack - tag-driven mod release tool.
//!
//! Packages a mod for a `v*` tag, writes its SHA-256 sidecar and publishes
//! both to the release for that tag.

use kodegen_bundler_modpack::cli;
use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Run CLI and get exit code
    let exit_code = match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };

    process::exit(exit_code);
}
