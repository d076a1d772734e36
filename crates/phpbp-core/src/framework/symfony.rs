use async_trait::async_trait;

use super::{Framework, WebSettings};
use crate::context::BuildContext;
use crate::{BuildpackError, Result};

/// Symfony 2 standard edition layout
pub struct Symfony2;

const WRITABLE_DIRS: &[&str] = &["app/cache", "app/logs"];

#[async_trait]
impl Framework for Symfony2 {
    fn name(&self) -> &'static str {
        "Symfony2"
    }

    fn detect(&self, ctx: &BuildContext) -> bool {
        ctx.requires("symfony/symfony") || ctx.requires("symfony/framework-bundle")
    }

    fn compile(&self, _ctx: &BuildContext, web: &mut WebSettings) -> Result<()> {
        web.default_document_root("web");
        web.default_index_document("app.php");
        web.server_rules.push(
            "        location ~ ^/(app_dev|config)\\.php(/|$) {\n            deny all;\n        }".to_string(),
        );
        Ok(())
    }

    fn end(&self, ctx: &BuildContext) -> Result<()> {
        for dir in WRITABLE_DIRS {
            std::fs::create_dir_all(ctx.build_dir.join(dir))?;
        }
        Ok(())
    }

    async fn post_compile(&self, ctx: &BuildContext) -> Result<()> {
        if !ctx.has_file("app/console") {
            log::debug!("No app/console, skipping cache warmup");
            return Ok(());
        }

        let status = ctx
            .run_php(&["app/console", "cache:warmup", "--env=prod", "--no-debug"])
            .await?;

        if !status.success() {
            return Err(BuildpackError::HookFailed(format!(
                "app/console cache:warmup exited with {}",
                status
            )));
        }
        Ok(())
    }

    fn log_files(&self, _ctx: &BuildContext) -> Vec<String> {
        vec!["app/logs/prod.log".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ComposerJson;
    use tempfile::TempDir;

    #[test]
    fn test_detect() {
        let mut ctx = BuildContext::new("/tmp/app", "/tmp/cache");
        assert!(!Symfony2.detect(&ctx));

        ctx.composer = Some(ComposerJson::parse(r#"{"require": {"symfony/framework-bundle": "2.3.*"}}"#).unwrap());
        assert!(Symfony2.detect(&ctx));

        ctx.composer = Some(ComposerJson::parse(r#"{"require-dev": {"symfony/symfony": "2.3.*"}}"#).unwrap());
        assert!(!Symfony2.detect(&ctx));
    }

    #[test]
    fn test_compile_and_end() {
        let dir = TempDir::new().unwrap();
        let ctx = BuildContext::new(dir.path(), dir.path().join("cache"));

        let mut web = WebSettings::default();
        Symfony2.compile(&ctx, &mut web).unwrap();
        Symfony2.end(&ctx).unwrap();

        assert_eq!(web.document_root(), "web");
        assert_eq!(web.index_document(), "app.php");
        assert!(web.server_rules[0].contains("app_dev"));
        assert!(dir.path().join("app/cache").is_dir());
        assert!(dir.path().join("app/logs").is_dir());
        assert_eq!(Symfony2.log_files(&ctx), vec!["app/logs/prod.log"]);
    }

    #[tokio::test]
    async fn test_post_compile_without_console() {
        let dir = TempDir::new().unwrap();
        let ctx = BuildContext::new(dir.path(), dir.path());

        Symfony2.post_compile(&ctx).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_post_compile_failure() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("app")).unwrap();
        std::fs::write(dir.path().join("app/console"), "exit 3\n").unwrap();
        std::fs::create_dir_all(dir.path().join("php/bin")).unwrap();
        std::os::unix::fs::symlink("/bin/sh", dir.path().join("php/bin/php")).unwrap();

        let mut ctx = BuildContext::new(dir.path(), dir.path());
        ctx.php_root = dir.path().join("php");

        let err = Symfony2.post_compile(&ctx).await.unwrap_err();
        assert!(matches!(err, BuildpackError::HookFailed(_)));
    }
}
