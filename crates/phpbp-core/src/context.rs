use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tokio::process::Command;

use crate::config::{AppSettings, ComposerJson};
use crate::env::Environment;
use crate::{BuildpackError, Result};

/// State shared by the build steps that run application code
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub build_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub composer: Option<ComposerJson>,
    pub settings: AppSettings,
    pub env: Environment,
    /// Where the PHP runtime currently lives. Moves once the layout is built.
    pub php_root: PathBuf,
}

impl BuildContext {
    pub fn new(build_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        let build_dir = build_dir.into();
        Self {
            php_root: build_dir.join("vendor").join("php"),
            build_dir,
            cache_dir: cache_dir.into(),
            composer: None,
            settings: AppSettings::default(),
            env: Environment::new(),
        }
    }

    /// Whether composer.json requires `package`
    pub fn requires(&self, package: &str) -> bool {
        self.composer
            .as_ref()
            .is_some_and(|composer| composer.requires(package))
    }

    pub fn has_file(&self, relative: impl AsRef<Path>) -> bool {
        self.build_dir.join(relative).is_file()
    }

    pub fn php_binary(&self) -> PathBuf {
        self.php_root.join("bin").join("php")
    }

    /// A `php` invocation in the build dir with the application environment
    pub fn php_command(&self) -> Command {
        let mut command = Command::new(self.php_binary());
        command
            .current_dir(&self.build_dir)
            .env("PHP_INI_SCAN_DIR", self.php_root.join("etc").join("conf.d"))
            .envs(self.env.iter());
        command
    }

    /// Run `php <args>` and wait for it
    pub async fn run_php(&self, args: &[&str]) -> Result<ExitStatus> {
        log::debug!("Running php {}", args.join(" "));

        self.php_command()
            .args(args)
            .status()
            .await
            .map_err(|source| BuildpackError::Spawn {
                name: "php".to_string(),
                source,
            })
    }
}
