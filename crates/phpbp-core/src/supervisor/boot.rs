use std::path::{Path, PathBuf};

use super::process::{ProcessExit, ProcessSpec};
use super::runner::Supervisor;
use super::sizing::{
    effective_memory_limit, CommandOracle, MemoryAutotune, Sizing, SizingOracle, DEFAULT_MEMORY_BUDGET,
};
use super::tail::LogTailer;
use crate::layout::{RuntimeLayout, RuntimeManifest};
use crate::template::{self, Vars};
use crate::{BuildpackError, Result};

pub const DEFAULT_PORT: u16 = 8080;

/// Runtime settings, normally read from the dyno environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootOptions {
    pub app_dir: PathBuf,
    pub port: u16,
    /// Memory available to the worker pool (`512M`, `1G`)
    pub memory_budget: String,
    /// Skips the sizing oracle when set
    pub concurrency: Option<u32>,
    /// External sizing command replacing the built-in autotune
    pub sizing_command: Option<String>,
}

impl BootOptions {
    pub fn new(app_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_dir: app_dir.into(),
            port: DEFAULT_PORT,
            memory_budget: DEFAULT_MEMORY_BUDGET.to_string(),
            concurrency: None,
            sizing_command: None,
        }
    }

    /// Read `PORT`, `MEMORY_AVAILABLE`, `WEB_CONCURRENCY` and
    /// `PHPBP_SIZING_COMMAND`
    pub fn from_env(app_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::from_lookup(app_dir, |key| std::env::var(key).ok())
    }

    fn from_lookup(app_dir: impl Into<PathBuf>, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut options = Self::new(app_dir);
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = lookup("PORT") {
            options.port = port
                .trim()
                .parse()
                .map_err(|_| BuildpackError::Config(format!("invalid PORT {}", port)))?;
        }
        if let Some(budget) = lookup("MEMORY_AVAILABLE") {
            options.memory_budget = budget;
        }
        if let Some(concurrency) = lookup("WEB_CONCURRENCY") {
            match concurrency.trim().parse::<u32>() {
                Ok(n) => options.concurrency = Some(n.max(1)),
                Err(_) => log::warn!("Ignoring invalid WEB_CONCURRENCY {}", concurrency),
            }
        }
        options.sizing_command = lookup("PHPBP_SIZING_COMMAND");

        Ok(options)
    }
}

/// Turns a compiled application into the two daemon launches
pub struct Boot {
    options: BootOptions,
    layout: RuntimeLayout,
    manifest: RuntimeManifest,
}

impl Boot {
    pub fn load(options: BootOptions) -> Result<Self> {
        let manifest = RuntimeManifest::load(&options.app_dir)?;
        Ok(Self {
            layout: RuntimeLayout::new(&options.app_dir),
            options,
            manifest,
        })
    }

    pub fn manifest(&self) -> &RuntimeManifest {
        &self.manifest
    }

    pub fn document_root(&self) -> PathBuf {
        let root = self.manifest.document_root.trim_matches('/');
        if root.is_empty() {
            self.layout.app_dir().to_path_buf()
        } else {
            self.layout.app_dir().join(root)
        }
    }

    fn read_template(&self, name: &str) -> Result<String> {
        let path = self.layout.template_dir().join(name);
        std::fs::read_to_string(&path)
            .map_err(|e| BuildpackError::Layout(format!("cannot read {}: {}", path.display(), e)))
    }

    fn render_to(&self, name: &str, vars: &Vars, dest: &Path) -> Result<()> {
        let rendered = template::render(name, &self.read_template(name)?, vars)?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, rendered)?;
        log::debug!("Wrote {}", dest.display());
        Ok(())
    }

    /// Rendered first: the sizing oracle reads it
    pub fn render_php_ini(&self) -> Result<()> {
        let vars = Vars::new()
            .set("app_dir", self.layout.app_dir().display())
            .set("extension_api", &self.manifest.extension_api)
            .set("php_config", self.manifest.php_config.join("\n"));

        self.render_to("php.ini.tpl", &vars, &self.layout.php_ini())
    }

    pub async fn sizing(&self, oracle: &dyn SizingOracle) -> Result<Sizing> {
        if let Some(concurrency) = self.options.concurrency {
            log::info!("Using WEB_CONCURRENCY={}", concurrency);
            return Ok(Sizing {
                concurrency,
                memory_limit: effective_memory_limit(&self.layout.php_ini(), &self.document_root())?,
            });
        }

        oracle
            .size(&self.layout.php_ini(), &self.document_root(), &self.options.memory_budget)
            .await
    }

    /// The configured sizing oracle
    pub fn oracle(&self) -> Box<dyn SizingOracle> {
        match self.options.sizing_command.as_deref().and_then(CommandOracle::parse) {
            Some(command) => Box::new(command),
            None => Box::new(MemoryAutotune),
        }
    }

    pub fn render_configs(&self, sizing: &Sizing) -> Result<()> {
        let app_dir = self.layout.app_dir();
        let includes: Vec<String> = self
            .manifest
            .nginx_includes
            .iter()
            .map(|include| format!("        include {};", app_dir.join(include).display()))
            .collect();

        let vars = Vars::new()
            .set("app_dir", app_dir.display())
            .set("port", self.options.port)
            .set("document_root", self.document_root().display())
            .set("index_document", &self.manifest.index_document)
            .set("server_rules", self.manifest.server_rules.join("\n"))
            .set("nginx_includes", includes.join("\n"))
            .set("concurrency", sizing.concurrency)
            .set("memory_limit", &sizing.memory_limit);

        self.render_to("nginx.conf.tpl", &vars, &self.layout.nginx_conf())?;
        self.render_to("php-fpm.conf.tpl", &vars, &self.layout.php_fpm_conf())
    }

    /// Runtime directories the daemons expect
    pub fn prepare_dirs(&self) -> Result<()> {
        for dir in [
            self.layout.php_run_dir(),
            self.layout.php_log_dir(),
            self.layout.nginx_log_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Daemon and application logs to stream to stdout
    pub fn log_files(&self) -> Vec<PathBuf> {
        let mut files = vec![
            self.layout.nginx_log_dir().join("error.log"),
            self.layout.nginx_log_dir().join("access.log"),
            self.layout.php_log_dir().join("php-fpm.log"),
            self.layout.php_log_dir().join("error.log"),
        ];
        files.extend(
            self.manifest
                .log_files
                .iter()
                .map(|file| self.layout.app_dir().join(file)),
        );
        files
    }

    pub fn nginx(&self) -> ProcessSpec {
        let root = self.layout.nginx_root();
        ProcessSpec::new("nginx", root.join("sbin").join("nginx"))
            .arg("-p")
            .arg(format!("{}/", root.display()))
            .arg("-c")
            .arg(self.layout.nginx_conf())
            .current_dir(self.layout.app_dir())
    }

    pub fn php_fpm(&self) -> ProcessSpec {
        let mut spec = ProcessSpec::new("php-fpm", self.layout.php_root().join("sbin").join("php-fpm"))
            .arg("--nodaemonize")
            .arg("--fpm-config")
            .arg(self.layout.php_fpm_conf())
            .arg("-c")
            .arg(self.layout.php_ini())
            .env("PHP_INI_SCAN_DIR", self.layout.php_conf_dir())
            .current_dir(self.layout.app_dir());

        if let Some(library_path) = self.library_path() {
            spec = spec.env("LD_LIBRARY_PATH", library_path);
        }
        spec
    }

    fn library_path(&self) -> Option<String> {
        if self.manifest.libraries.is_empty() {
            return None;
        }

        let mut paths: Vec<String> = self
            .manifest
            .libraries
            .iter()
            .map(|name| self.layout.library_dir(name).join("lib").display().to_string())
            .collect();
        if let Ok(existing) = std::env::var("LD_LIBRARY_PATH") {
            if !existing.is_empty() {
                paths.push(existing);
            }
        }
        Some(paths.join(":"))
    }
}

/// Configure and supervise php-fpm and nginx until one of them exits
pub async fn boot(options: BootOptions) -> Result<ProcessExit> {
    let boot = Boot::load(options)?;
    let mut supervisor = Supervisor::new();
    supervisor.begin()?;

    boot.render_php_ini()?;
    let sizing = boot.sizing(boot.oracle().as_ref()).await?;
    log::info!(
        "Sized php-fpm to {} workers at memory_limit {}",
        sizing.concurrency,
        sizing.memory_limit
    );

    boot.render_configs(&sizing)?;
    boot.prepare_dirs()?;

    let mut tailer = LogTailer::new(boot.log_files());
    tailer.prepare()?;
    tailer.spawn(tokio::io::stdout());

    supervisor.run(boot.php_fpm(), boot.nginx()).await
}
