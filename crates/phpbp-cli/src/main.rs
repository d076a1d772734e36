use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::process::ExitCode;

mod boot;
mod compile;
mod detect;
mod fetch;
mod output;
mod release;

use output::{Output, Verbosity};

#[derive(Parser, Debug)]
#[command(name = "phpbp")]
#[command(about = "Buildpack for PHP applications served by nginx and php-fpm")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Show debug logs and detail lines
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Exit 0 and print `PHP` if the checkout is a PHP application
    Detect(detect::DetectArgs),

    /// Build the application in place
    Compile(compile::CompileArgs),

    /// Print the default process types of a compiled application
    Release(release::ReleaseArgs),

    /// Configure and run nginx and php-fpm until one of them exits
    Boot(boot::BootArgs),

    /// Fetch a single package from the catalog
    Fetch(fetch::FetchArgs),
}

fn init_logging(verbose: u8) {
    let level = if verbose > 0 { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run() -> Result<i32> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut output = Output::new();
    if args.quiet {
        output.set_verbosity(Verbosity::Quiet);
    } else if args.verbose > 0 {
        output.set_verbosity(Verbosity::Verbose);
    }

    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    match args.command {
        Commands::Detect(detect_args) => rt.block_on(detect::execute(detect_args)),
        Commands::Compile(compile_args) => rt.block_on(compile::execute(compile_args, &output)),
        Commands::Release(release_args) => rt.block_on(release::execute(release_args)),
        Commands::Boot(boot_args) => rt.block_on(boot::execute(boot_args, &output)),
        Commands::Fetch(fetch_args) => rt.block_on(fetch::execute(fetch_args, &output)),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            let output = Output::new();
            output.error(&e.to_string());
            for cause in e.chain().skip(1) {
                output.error(&format!("  Caused by: {}", cause));
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_compile_with_env_dir() {
        let args = Args::try_parse_from(["phpbp", "-vv", "compile", "/tmp/build", "/tmp/cache", "/tmp/env"]).unwrap();
        assert_eq!(args.verbose, 2);
        match args.command {
            Commands::Compile(compile) => {
                assert_eq!(compile.env_dir.as_deref(), Some(std::path::Path::new("/tmp/env")));
                assert!(!compile.no_binary);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_fetch_requires_cache() {
        assert!(Args::try_parse_from(["phpbp", "fetch", "php-5.5.7", "/tmp/php"]).is_err());
        assert!(Args::try_parse_from(["phpbp", "fetch", "php-5.5.7", "/tmp/php", "--cache", "/tmp/c"]).is_ok());
    }
}
