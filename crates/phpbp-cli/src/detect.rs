//! Detect command - decide whether a checkout is a PHP application.

use anyhow::Result;
use clap::Args;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Application checkout
    #[arg(value_name = "BUILD_DIR")]
    pub build_dir: PathBuf,
}

const MARKERS: &[&str] = &["composer.json", "index.php"];

pub fn is_php_app(build_dir: &Path) -> bool {
    MARKERS.iter().any(|marker| build_dir.join(marker).is_file())
}

pub async fn execute(args: DetectArgs) -> Result<i32> {
    if is_php_app(&args.build_dir) {
        println!("PHP");
        Ok(0)
    } else {
        println!("no");
        Ok(1)
    }
}
