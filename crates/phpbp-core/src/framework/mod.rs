//! Framework support.
//!
//! Each supported framework is a [`Framework`] variant in an ordered
//! [`FrameworkRegistry`]. The registry is consulted once per build; the first
//! variant whose `detect` matches is used for every later step. A variant can
//! be forced with `extra.phpbp.framework` in composer.json.

mod classic;
mod magento;
mod micro;
mod symfony;

pub use classic::Classic;
pub use magento::Magento;
pub use micro::{Silex, Slim};
pub use symfony::Symfony2;

use async_trait::async_trait;

use crate::context::BuildContext;
use crate::{BuildpackError, Result};

/// Web server settings a framework may fill in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebSettings {
    /// Relative to the application directory, empty for the root
    pub document_root: Option<String>,
    pub index_document: Option<String>,
    /// Extra nginx directives for the server block
    pub server_rules: Vec<String>,
}

impl WebSettings {
    /// Start from what the application configured explicitly
    pub fn from_context(ctx: &BuildContext) -> Self {
        Self {
            document_root: ctx.settings.document_root.clone(),
            index_document: ctx.settings.index_document.clone(),
            server_rules: Vec::new(),
        }
    }

    pub fn document_root(&self) -> &str {
        self.document_root.as_deref().unwrap_or("")
    }

    pub fn index_document(&self) -> &str {
        self.index_document.as_deref().unwrap_or("index.php")
    }

    /// Set the document root unless the application chose one
    pub fn default_document_root(&mut self, root: &str) {
        self.document_root.get_or_insert_with(|| root.to_string());
    }

    pub fn default_index_document(&mut self, index: &str) {
        self.index_document.get_or_insert_with(|| index.to_string());
    }
}

/// Build hooks for one kind of application
#[async_trait]
pub trait Framework: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, ctx: &BuildContext) -> bool;

    /// Apply framework defaults to the web settings
    fn compile(&self, ctx: &BuildContext, web: &mut WebSettings) -> Result<()>;

    /// Runs after dependencies are installed
    fn end(&self, _ctx: &BuildContext) -> Result<()> {
        Ok(())
    }

    /// Runs against the final layout. Failures are reported, never fatal.
    async fn post_compile(&self, _ctx: &BuildContext) -> Result<()> {
        Ok(())
    }

    /// Application log files, relative to the application directory
    fn log_files(&self, _ctx: &BuildContext) -> Vec<String> {
        Vec::new()
    }

    /// Matches anything; never counted when reporting ambiguous detection
    fn is_fallback(&self) -> bool {
        false
    }
}

/// The framework chosen for a build
pub struct Selection<'a> {
    pub framework: &'a dyn Framework,
    /// Other frameworks that also matched
    pub ignored: Vec<&'static str>,
}

pub struct FrameworkRegistry {
    frameworks: Vec<Box<dyn Framework>>,
}

impl FrameworkRegistry {
    pub fn new(frameworks: Vec<Box<dyn Framework>>) -> Self {
        Self { frameworks }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.frameworks.iter().map(|f| f.name()).collect()
    }

    /// Look up a framework by name, ignoring case
    pub fn get(&self, name: &str) -> Option<&dyn Framework> {
        self.frameworks
            .iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
            .map(|f| f.as_ref())
    }

    /// Pick the framework for the application in `ctx`
    pub fn select(&self, ctx: &BuildContext) -> Result<Selection<'_>> {
        if let Some(name) = &ctx.settings.framework {
            let framework = self
                .get(name)
                .ok_or_else(|| BuildpackError::UnknownFramework(name.clone()))?;
            log::debug!("Framework forced to {}", framework.name());
            return Ok(Selection {
                framework,
                ignored: Vec::new(),
            });
        }

        let mut matched = self.frameworks.iter().filter(|f| f.detect(ctx));
        let framework: &dyn Framework = matched.next().ok_or(BuildpackError::NoFramework)?.as_ref();

        let ignored: Vec<_> = matched
            .filter(|f| !f.is_fallback())
            .map(|f| f.name())
            .collect();

        if !ignored.is_empty() {
            log::warn!(
                "Application also matches {}, using {}",
                ignored.join(", "),
                framework.name()
            );
        }

        Ok(Selection { framework, ignored })
    }
}

impl Default for FrameworkRegistry {
    fn default() -> Self {
        Self::new(vec![
            Box::new(Symfony2),
            Box::new(Silex),
            Box::new(Slim),
            Box::new(Magento),
            Box::new(Classic),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ComposerJson;
    use tempfile::TempDir;

    fn context(dir: &TempDir, composer: &str) -> BuildContext {
        let mut ctx = BuildContext::new(dir.path(), dir.path().join("cache"));
        ctx.composer = Some(ComposerJson::parse(composer).unwrap());
        ctx
    }

    #[test]
    fn test_default_order() {
        let registry = FrameworkRegistry::default();
        assert_eq!(registry.names(), vec!["Symfony2", "Silex", "Slim", "Magento", "Classic"]);
    }

    #[test]
    fn test_select_first_match() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, r#"{"require": {"silex/silex": "1.*"}}"#);

        let registry = FrameworkRegistry::default();
        let selection = registry.select(&ctx).unwrap();
        assert_eq!(selection.framework.name(), "Silex");
        assert!(selection.ignored.is_empty());
    }

    #[test]
    fn test_select_ambiguous_keeps_first() {
        let dir = TempDir::new().unwrap();
        let ctx = context(
            &dir,
            r#"{"require": {"slim/slim": "2.*", "symfony/framework-bundle": "2.3.*"}}"#,
        );

        let registry = FrameworkRegistry::default();
        let selection = registry.select(&ctx).unwrap();
        assert_eq!(selection.framework.name(), "Symfony2");
        assert_eq!(selection.ignored, vec!["Slim"]);
    }

    #[test]
    fn test_select_falls_back_to_classic() {
        let dir = TempDir::new().unwrap();
        let ctx = BuildContext::new(dir.path(), dir.path());

        let registry = FrameworkRegistry::default();
        let selection = registry.select(&ctx).unwrap();
        assert_eq!(selection.framework.name(), "Classic");
    }

    #[test]
    fn test_forced_framework() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir, r#"{"require": {"slim/slim": "2.*"}}"#);
        ctx.settings.framework = Some("magento".to_string());

        let registry = FrameworkRegistry::default();
        let selection = registry.select(&ctx).unwrap();
        assert_eq!(selection.framework.name(), "Magento");
    }

    #[test]
    fn test_unknown_forced_framework() {
        let dir = TempDir::new().unwrap();
        let mut ctx = BuildContext::new(dir.path(), dir.path());
        ctx.settings.framework = Some("laravel".to_string());

        let registry = FrameworkRegistry::default();
        let result = registry.select(&ctx);
        assert!(matches!(result, Err(BuildpackError::UnknownFramework(name)) if name == "laravel"));
    }

    #[test]
    fn test_no_framework() {
        let dir = TempDir::new().unwrap();
        let ctx = BuildContext::new(dir.path(), dir.path());

        let registry = FrameworkRegistry::new(vec![Box::new(Silex)]);
        assert!(matches!(registry.select(&ctx), Err(BuildpackError::NoFramework)));
    }

    #[test]
    fn test_web_settings_keep_explicit_values() {
        let dir = TempDir::new().unwrap();
        let mut ctx = BuildContext::new(dir.path(), dir.path());
        ctx.settings.document_root = Some("htdocs".to_string());

        let mut web = WebSettings::from_context(&ctx);
        web.default_document_root("web");
        web.default_index_document("app.php");

        assert_eq!(web.document_root(), "htdocs");
        assert_eq!(web.index_document(), "app.php");
        assert_eq!(WebSettings::default().index_document(), "index.php");
    }
}
