use super::{Framework, WebSettings};
use crate::context::BuildContext;
use crate::Result;

/// Plain PHP files served from the document root
pub struct Classic;

impl Framework for Classic {
    fn name(&self) -> &'static str {
        "Classic"
    }

    fn detect(&self, _ctx: &BuildContext) -> bool {
        true
    }

    fn compile(&self, _ctx: &BuildContext, web: &mut WebSettings) -> Result<()> {
        web.default_document_root("");
        web.default_index_document("index.php");
        Ok(())
    }

    fn is_fallback(&self) -> bool {
        true
    }
}
