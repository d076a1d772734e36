//! Release command - describe the process types of a compiled slug.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use phpbp_core::layout::BINARY_PATH;

#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// Compiled application
    #[arg(value_name = "BUILD_DIR")]
    pub build_dir: PathBuf,
}

pub fn release_yaml() -> String {
    format!("---\ndefault_process_types:\n  web: {} boot\n", BINARY_PATH)
}

pub async fn execute(_args: ReleaseArgs) -> Result<i32> {
    print!("{}", release_yaml());
    Ok(0)
}
