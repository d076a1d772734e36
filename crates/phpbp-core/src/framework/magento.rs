use super::{Framework, WebSettings};
use crate::context::BuildContext;
use crate::Result;

/// Magento 1
pub struct Magento;

const WRITABLE_DIRS: &[&str] = &["var", "var/log", "media"];

const PROTECTED_PATHS: &[&str] = &["app", "includes", "lib", "var", "downloader"];

impl Framework for Magento {
    fn name(&self) -> &'static str {
        "Magento"
    }

    fn detect(&self, ctx: &BuildContext) -> bool {
        ctx.has_file("app/Mage.php")
    }

    fn compile(&self, _ctx: &BuildContext, web: &mut WebSettings) -> Result<()> {
        web.default_document_root("");
        web.default_index_document("index.php");

        for path in PROTECTED_PATHS {
            web.server_rules.push(format!(
                "        location ^~ /{}/ {{\n            deny all;\n        }}",
                path
            ));
        }
        Ok(())
    }

    fn end(&self, ctx: &BuildContext) -> Result<()> {
        for dir in WRITABLE_DIRS {
            std::fs::create_dir_all(ctx.build_dir.join(dir))?;
        }
        Ok(())
    }

    fn log_files(&self, _ctx: &BuildContext) -> Vec<String> {
        vec![
            "var/log/system.log".to_string(),
            "var/log/exception.log".to_string(),
        ]
    }
}
