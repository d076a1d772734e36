//! The `compile` step: turn an application checkout into a runnable slug.

use indexmap::IndexSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::ChecksumStore;
use crate::composer::ComposerInstaller;
use crate::config::{merge_extensions, BuildpackConfig, ComposerJson};
use crate::context::BuildContext;
use crate::downloader::{open_catalog, Catalog, FetchResult, Fetcher};
use crate::env::Environment;
use crate::extension::{ExtensionResolver, InstalledLibs, Resolution, RuntimePaths};
use crate::framework::{FrameworkRegistry, WebSettings};
use crate::http::HttpClientConfig;
use crate::layout::{LayoutBuilder, RuntimeManifest};
use crate::package::PackageId;
use crate::{BuildpackError, Result};

/// Scratch directory inside the build dir, removed after a successful build
pub const STAGE_DIR: &str = ".phpbp-stage";

type StepReporter = Box<dyn Fn(&str) + Send + Sync>;

/// What a compile did
#[derive(Debug)]
pub struct CompileReport {
    pub framework: String,
    /// Frameworks that also matched but were not used
    pub ignored_frameworks: Vec<String>,
    pub packages: Vec<FetchResult>,
    pub extensions: Resolution,
    pub dependencies_installed: bool,
    pub manifest: RuntimeManifest,
    /// Problems that did not stop the build
    pub warnings: Vec<String>,
}

pub struct Compiler {
    build_dir: PathBuf,
    cache_dir: PathBuf,
    env_dir: Option<PathBuf>,
    binary: Option<PathBuf>,
    catalog: Option<Arc<dyn Catalog>>,
    http_config: HttpClientConfig,
    registry: FrameworkRegistry,
    reporter: Option<StepReporter>,
}

impl Compiler {
    pub fn new(build_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
            cache_dir: cache_dir.into(),
            env_dir: None,
            binary: None,
            catalog: None,
            http_config: HttpClientConfig::from_env(),
            registry: FrameworkRegistry::default(),
            reporter: None,
        }
    }

    /// Import application variables from `dir`
    pub fn with_env_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.env_dir = Some(dir.into());
        self
    }

    /// Binary copied into the slug to run `boot`
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    /// Use this catalog instead of the configured catalog URL
    pub fn with_catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_http_config(mut self, config: HttpClientConfig) -> Self {
        self.http_config = config;
        self
    }

    pub fn with_registry(mut self, registry: FrameworkRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Called with a short description as each build step starts
    pub fn on_step(mut self, reporter: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.reporter = Some(Box::new(reporter));
        self
    }

    fn step(&self, message: &str) {
        log::info!("{}", message);
        if let Some(reporter) = &self.reporter {
            reporter(message);
        }
    }

    fn stage_dir(&self) -> PathBuf {
        self.build_dir.join(STAGE_DIR)
    }

    pub async fn compile(&self) -> Result<CompileReport> {
        let composer = ComposerJson::load(&self.build_dir)?;
        let settings = match &composer {
            Some(composer) => composer.settings()?,
            None => Default::default(),
        };
        let env = match &self.env_dir {
            Some(dir) if dir.is_dir() => Environment::import(dir)?,
            _ => Environment::new(),
        };
        let config = BuildpackConfig::load(&self.build_dir, &settings, &env)?;
        let api = config
            .extension_api()
            .ok_or_else(|| BuildpackError::Config("no extension API".to_string()))?
            .to_string();

        let mut ctx = BuildContext::new(&self.build_dir, &self.cache_dir);
        ctx.composer = composer;
        ctx.settings = settings;
        ctx.env = env;

        let selection = self.registry.select(&ctx)?;
        let framework = selection.framework;
        let mut warnings = Vec::new();
        if !selection.ignored.is_empty() {
            warnings.push(format!(
                "Application also matches {}, using {}",
                selection.ignored.join(", "),
                framework.name()
            ));
        }
        self.step(&format!("PHP application detected ({})", framework.name()));

        let fetcher = Fetcher::new(self.open_catalog(&config)?, ChecksumStore::new(&self.cache_dir))
            .with_digest_verification(config.verify_digests);

        let stage = self.stage_dir();
        if stage.exists() {
            std::fs::remove_dir_all(&stage)?;
        }

        let mut packages = Vec::new();
        self.step(&format!("Installing nginx {}", config.nginx_version));
        packages.push(
            fetcher
                .fetch(&PackageId::new(config.nginx_package())?, &stage.join("nginx"))
                .await?,
        );
        self.step(&format!("Installing PHP {}", config.php_version));
        packages.push(
            fetcher
                .fetch(&PackageId::new(config.php_package())?, &stage.join("php"))
                .await?,
        );
        ctx.php_root = stage.join("php");

        let extensions = merge_extensions([
            ctx.composer
                .as_ref()
                .map(ComposerJson::required_extensions)
                .unwrap_or_default()
                .as_slice(),
            ctx.settings.extensions.as_slice(),
        ]);

        let graph = config.extension_graph();
        let mut libs = InstalledLibs::new();
        if !extensions.is_empty() {
            self.step(&format!("Installing extensions: {}", extensions.join(", ")));
        }
        let resolution = ExtensionResolver::new(&fetcher, &graph, RuntimePaths::new(&ctx.php_root, &api), &api)
            .resolve(&extensions, &mut libs)
            .await?;
        for (name, warning) in resolution.degraded() {
            warnings.push(format!("Extension {} not installed: {}", name, warning));
        }

        let mut web = WebSettings::from_context(&ctx);
        framework.compile(&ctx, &mut web)?;

        self.step("Installing dependencies using Composer");
        let dependencies_installed = ComposerInstaller::new(&fetcher).install(&ctx).await?;
        framework.end(&ctx)?;

        self.step("Building runtime layout");
        let builder = LayoutBuilder::new(&self.build_dir);
        builder.relocate(&stage.join("nginx"), "nginx")?;
        builder.relocate(&stage.join("php"), "php")?;
        let libraries = builder.relocate_libraries(&libs)?;
        builder.write_templates()?;

        let manifest = RuntimeManifest {
            framework: framework.name().to_string(),
            php_version: config.php_version.clone(),
            extension_api: api.clone(),
            document_root: web.document_root().to_string(),
            index_document: web.index_document().to_string(),
            server_rules: web.server_rules.clone(),
            nginx_includes: ctx.settings.nginx_includes.clone(),
            php_config: ctx.settings.php_config.clone(),
            log_files: merge_log_files(&framework.log_files(&ctx), &ctx.settings.log_files),
            libraries,
        };
        builder.write_manifest(&manifest)?;

        if let Some(binary) = &self.binary {
            builder.install_binary(binary)?;
        }
        ctx.php_root = builder.layout().php_root();

        if let Err(e) = framework.post_compile(&ctx).await {
            log::warn!("post-compile hook failed: {}", e);
            warnings.push(format!("{} post-compile hook failed: {}", framework.name(), e));
        }

        remove_stage(&stage)?;

        Ok(CompileReport {
            framework: framework.name().to_string(),
            ignored_frameworks: selection.ignored.iter().map(|n| n.to_string()).collect(),
            packages,
            extensions: resolution,
            dependencies_installed,
            manifest,
            warnings,
        })
    }

    fn open_catalog(&self, config: &BuildpackConfig) -> Result<Arc<dyn Catalog>> {
        match &self.catalog {
            Some(catalog) => Ok(catalog.clone()),
            None => open_catalog(&config.catalog_url, self.http_config.clone()),
        }
    }
}

fn merge_log_files(framework: &[String], configured: &[String]) -> Vec<String> {
    framework
        .iter()
        .chain(configured)
        .cloned()
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

fn remove_stage(stage: &Path) -> Result<()> {
    if stage.exists() {
        std::fs::remove_dir_all(stage)?;
    }
    Ok(())
}
