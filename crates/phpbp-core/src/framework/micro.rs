//! Micro-frameworks routed through a single front controller.

use super::{Framework, WebSettings};
use crate::context::BuildContext;
use crate::Result;

pub struct Silex;

impl Framework for Silex {
    fn name(&self) -> &'static str {
        "Silex"
    }

    fn detect(&self, ctx: &BuildContext) -> bool {
        ctx.requires("silex/silex")
    }

    fn compile(&self, _ctx: &BuildContext, web: &mut WebSettings) -> Result<()> {
        web.default_document_root("web");
        web.default_index_document("index.php");
        Ok(())
    }
}

pub struct Slim;

impl Framework for Slim {
    fn name(&self) -> &'static str {
        "Slim"
    }

    fn detect(&self, ctx: &BuildContext) -> bool {
        ctx.requires("slim/slim")
    }

    fn compile(&self, ctx: &BuildContext, web: &mut WebSettings) -> Result<()> {
        if ctx.build_dir.join("public").is_dir() {
            web.default_document_root("public");
        }
        web.default_index_document("index.php");
        Ok(())
    }
}
