//! Boot command - run nginx and php-fpm for a compiled application.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use phpbp_core::supervisor::FATAL_EXIT_CODE;
use phpbp_core::BootOptions;

use crate::output::Output;

#[derive(Args, Debug)]
pub struct BootArgs {
    /// Compiled application root
    #[arg(long, default_value = ".")]
    pub app_dir: PathBuf,
}

pub async fn execute(args: BootArgs, output: &Output) -> Result<i32> {
    let app_dir = args
        .app_dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve application directory {}", args.app_dir.display()))?;

    let options = BootOptions::from_env(&app_dir).context("Invalid runtime environment")?;
    log::info!("Booting {} on port {}", app_dir.display(), options.port);

    let exit = phpbp_core::boot(options).await.context("Failed to boot")?;
    output.error(&format!("Process exited: {}", exit));
    Ok(FATAL_EXIT_CODE)
}
