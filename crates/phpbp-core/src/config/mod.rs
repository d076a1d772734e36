//! Build configuration
//!
//! Settings are merged from several sources, in priority order (highest to
//! lowest):
//!
//! 1. Environment variables (`PHPBP_*`), imported env dir values first
//! 2. `phpbp.toml` at the application root
//! 3. `composer.json` → `extra.phpbp`
//! 4. Built-in defaults
//!
//! # Example
//!
//! ```toml
//! [buildpack]
//! catalog-url = "https://packages.example.com"
//! php-version = "5.4.17"
//!
//! [extension-dependencies]
//! mongo = "libmongoc"
//!
//! [libraries]
//! libmongoc = "/app/vendor/libmongoc"
//! ```

mod composer;
mod config;

pub use composer::{merge_extensions, AppSettings, ComposerJson};
pub use config::{
    extension_api_for, BuildpackConfig, DEFAULT_CATALOG_URL, DEFAULT_LIBS_ROOT, DEFAULT_NGINX_VERSION,
    DEFAULT_PHP_VERSION,
};
