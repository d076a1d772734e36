//! Final on-disk runtime layout.
//!
//! Everything the runtime needs lives under `<app>/vendor`:
//!
//! ```text
//! vendor/nginx/               web server (conf/nginx.conf rendered at boot)
//! vendor/php/                 PHP runtime (etc/php.ini, etc/php-fpm.conf)
//! vendor/<library>/           native libraries pulled in by extensions
//! vendor/phpbp/bin/phpbp      this binary
//! vendor/phpbp/conf/*.tpl     config templates
//! vendor/phpbp/manifest.toml  build decisions read at boot
//! ```

mod builder;
mod manifest;

pub use builder::LayoutBuilder;
pub use manifest::RuntimeManifest;

use std::path::{Path, PathBuf};

/// Location of the installed binary, relative to the application root
pub const BINARY_PATH: &str = "vendor/phpbp/bin/phpbp";

/// Paths inside an application's runtime layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeLayout {
    app_dir: PathBuf,
}

impl RuntimeLayout {
    pub fn new(app_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_dir: app_dir.into(),
        }
    }

    pub fn app_dir(&self) -> &Path {
        &self.app_dir
    }

    pub fn vendor_dir(&self) -> PathBuf {
        self.app_dir.join("vendor")
    }

    pub fn nginx_root(&self) -> PathBuf {
        self.vendor_dir().join("nginx")
    }

    pub fn php_root(&self) -> PathBuf {
        self.vendor_dir().join("php")
    }

    pub fn phpbp_root(&self) -> PathBuf {
        self.vendor_dir().join("phpbp")
    }

    pub fn template_dir(&self) -> PathBuf {
        self.phpbp_root().join("conf")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.phpbp_root().join("manifest.toml")
    }

    pub fn binary_path(&self) -> PathBuf {
        self.app_dir.join(BINARY_PATH)
    }

    pub fn nginx_conf(&self) -> PathBuf {
        self.nginx_root().join("conf").join("nginx.conf")
    }

    pub fn nginx_log_dir(&self) -> PathBuf {
        self.nginx_root().join("logs")
    }

    pub fn php_ini(&self) -> PathBuf {
        self.php_root().join("etc").join("php.ini")
    }

    pub fn php_fpm_conf(&self) -> PathBuf {
        self.php_root().join("etc").join("php-fpm.conf")
    }

    pub fn php_conf_dir(&self) -> PathBuf {
        self.php_root().join("etc").join("conf.d")
    }

    pub fn php_run_dir(&self) -> PathBuf {
        self.php_root().join("var").join("run")
    }

    pub fn php_log_dir(&self) -> PathBuf {
        self.php_root().join("var").join("log")
    }

    pub fn library_dir(&self, name: &str) -> PathBuf {
        self.vendor_dir().join(name)
    }
}
