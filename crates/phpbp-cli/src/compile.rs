//! Compile command - build a slug from an application checkout.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use phpbp_core::{CompileReport, Compiler, Outcome};

use crate::output::Output;

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Application checkout, built in place
    #[arg(value_name = "BUILD_DIR")]
    pub build_dir: PathBuf,

    /// Cache directory kept between builds
    #[arg(value_name = "CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// Directory of application config variables, one file per variable
    #[arg(value_name = "ENV_DIR")]
    pub env_dir: Option<PathBuf>,

    /// Do not install the buildpack binary into the slug
    #[arg(long)]
    pub no_binary: bool,
}

pub async fn execute(args: CompileArgs, output: &Output) -> Result<i32> {
    std::fs::create_dir_all(&args.cache_dir)
        .with_context(|| format!("Failed to create cache directory {}", args.cache_dir.display()))?;

    let mut compiler = Compiler::new(&args.build_dir, &args.cache_dir);
    if let Some(env_dir) = &args.env_dir {
        compiler = compiler.with_env_dir(env_dir);
    }
    if !args.no_binary {
        let binary = std::env::current_exe().context("Failed to locate the phpbp binary")?;
        compiler = compiler.with_binary(binary);
    }

    let steps = output.clone();
    let report = compiler
        .on_step(move |step| steps.section(step))
        .compile()
        .await
        .with_context(|| format!("Failed to compile {}", args.build_dir.display()))?;

    print_report(&report, output);
    Ok(0)
}

fn print_report(report: &CompileReport, output: &Output) {
    for package in &report.packages {
        let source = if package.from_cache { "cached" } else { "downloaded" };
        output.verbose(&format!("{} ({})", package.id, source));
    }
    for (name, outcome) in &report.extensions.outcomes {
        if let Outcome::Ok(status) = outcome {
            output.info(&format!("ext-{} ({:?})", name, status));
        }
    }
    if !report.dependencies_installed {
        output.info("No composer.json, skipped dependency installation");
    }
    for warning in &report.warnings {
        output.warning(warning);
    }
    output.section(&format!(
        "Done, serving {} from /{}",
        report.framework, report.manifest.document_root
    ));
}
