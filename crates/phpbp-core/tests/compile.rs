//! Full compile of a small Silex application against a local catalog.
//!
//! `bin/php` in the fake PHP package links to `/bin/sh`, so the
//! application's `composer.phar` is a shell script.
#![cfg(unix)]

use flate2::write::GzEncoder;
use flate2::Compression;
use phpbp_core::extension::ExtensionStatus;
use phpbp_core::{BuildpackError, Compiler, DirCatalog, Outcome, RuntimeManifest};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

enum Entry<'a> {
    File(&'a str, &'a str),
    Symlink(&'a str, &'a str),
}

fn write_package(catalog: &Path, id: &str, checksum: Option<&str>, entries: &[Entry]) {
    let tarball = catalog.join("package").join(format!("{}.tgz", id));
    std::fs::create_dir_all(tarball.parent().unwrap()).unwrap();

    let file = std::fs::File::create(&tarball).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for entry in entries {
        let mut header = tar::Header::new_gnu();
        match entry {
            Entry::File(name, content) => {
                header.set_size(content.len() as u64);
                header.set_mode(0o755);
                header.set_cksum();
                builder.append_data(&mut header, name, content.as_bytes()).unwrap();
            }
            Entry::Symlink(name, target) => {
                header.set_entry_type(tar::EntryType::Symlink);
                header.set_size(0);
                header.set_mode(0o777);
                header.set_link_name(target).unwrap();
                header.set_cksum();
                builder.append_data(&mut header, name, std::io::empty()).unwrap();
            }
        }
    }
    builder.into_inner().unwrap().finish().unwrap();

    if let Some(checksum) = checksum {
        std::fs::write(catalog.join("package").join(format!("{}.md5", id)), checksum).unwrap();
    }
}

struct App {
    dir: TempDir,
    catalog: PathBuf,
    cache: PathBuf,
    libs: PathBuf,
}

impl App {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let catalog = dir.path().join("catalog");
        let cache = dir.path().join("cache");
        let libs = dir.path().join("libs");

        write_package(
            &catalog,
            "nginx-1.4.4",
            Some("nginx-v1"),
            &[
                Entry::File("sbin/nginx", "#!/bin/sh\n"),
                Entry::File("conf/mime.types", "types {}\n"),
            ],
        );
        write_package(
            &catalog,
            "php-5.5.7",
            Some("php-v1"),
            &[
                Entry::Symlink("bin/php", "/bin/sh"),
                Entry::File("sbin/php-fpm", "#!/bin/sh\n"),
                Entry::File("lib/php/extensions/no-debug-non-zts-20121212/opcache.so", "so"),
            ],
        );
        write_package(
            &catalog,
            "ext/20121212/php-redis",
            None,
            &[Entry::File("lib/php/extensions/no-debug-non-zts-20121212/redis.so", "so")],
        );
        write_package(
            &catalog,
            "ext/20121212/php-apcu",
            None,
            &[Entry::File("lib/php/extensions/no-debug-non-zts-20121212/apcu.so", "so")],
        );
        write_package(
            &catalog,
            "libhiredis",
            Some("hiredis-v1"),
            &[Entry::File("lib/libhiredis.so", "so")],
        );

        Self {
            dir,
            catalog,
            cache,
            libs,
        }
    }

    /// A fresh checkout of the application
    fn checkout(&self, name: &str) -> PathBuf {
        let build = self.dir.path().join(name);
        std::fs::create_dir_all(build.join("web")).unwrap();

        std::fs::write(
            build.join("composer.json"),
            r#"{
                "require": {
                    "silex/silex": "~1.1",
                    "ext-redis": "*",
                    "ext-mongo": "*"
                },
                "extra": {
                    "phpbp": {
                        "extensions": ["apcu", "opcache", "redis"],
                        "log-files": ["var/app.log"],
                        "php-config": ["short_open_tag = On"]
                    }
                }
            }"#,
        )
        .unwrap();
        std::fs::write(build.join("composer.lock"), "{}").unwrap();
        std::fs::write(
            build.join("composer.phar"),
            "mkdir -p vendor\necho \"<?php // $1\" > vendor/autoload.php\n",
        )
        .unwrap();
        std::fs::write(
            build.join("phpbp.toml"),
            format!("[buildpack]\nlibs-root = \"{}\"\n", self.libs.display()),
        )
        .unwrap();

        build
    }

    fn compiler(&self, build: &Path) -> Compiler {
        Compiler::new(build, &self.cache).with_catalog(Arc::new(DirCatalog::new(&self.catalog)))
    }
}

#[tokio::test]
async fn test_compile_silex_app() {
    let app = App::new();
    let build = app.checkout("build");
    let binary = app.dir.path().join("phpbp");
    std::fs::write(&binary, "binary").unwrap();

    let steps = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&steps);
    let report = app
        .compiler(&build)
        .with_binary(&binary)
        .on_step(move |step| recorded.lock().unwrap().push(step.to_string()))
        .compile()
        .await
        .unwrap();

    assert_eq!(report.framework, "Silex");
    assert!(report.dependencies_installed);
    assert_eq!(steps.lock().unwrap()[0], "PHP application detected (Silex)");

    // Extensions: redis and mongo from require, apcu and opcache from extra
    let ext = &report.extensions;
    assert_eq!(ext.status_of("redis").unwrap().warning(), None);
    assert!(matches!(ext.status_of("opcache"), Some(Outcome::Ok(ExtensionStatus::Bundled))));
    assert!(ext.status_of("mongo").unwrap().is_degraded());
    assert!(report.warnings.iter().any(|w| w.contains("mongo")));

    let vendor = build.join("vendor");
    assert!(vendor.join("nginx/sbin/nginx").is_file());
    assert!(vendor.join("php/sbin/php-fpm").is_file());
    assert_eq!(std::fs::read_to_string(vendor.join("php/etc/conf.d/redis.ini")).unwrap(), "extension=redis.so\n");
    assert_eq!(std::fs::read_to_string(vendor.join("php/etc/conf.d/opcache.ini")).unwrap(), "zend_extension=opcache.so\n");
    assert!(vendor.join("php/etc/conf.d/apcu.ini").is_file());
    assert!(!vendor.join("php/etc/conf.d/mongo.ini").exists());

    // The native dependency of redis moved into the slug
    assert!(vendor.join("libhiredis/lib/libhiredis.so").is_file());
    assert!(!app.libs.join("libhiredis").exists());

    // Composer ran with the staged runtime
    assert!(std::fs::read_to_string(vendor.join("autoload.php")).unwrap().contains("install"));

    assert!(vendor.join("phpbp/conf/nginx.conf.tpl").is_file());
    assert_eq!(std::fs::read_to_string(vendor.join("phpbp/bin/phpbp")).unwrap(), "binary");
    assert!(!build.join(".phpbp-stage").exists());

    let manifest = RuntimeManifest::load(&build).unwrap();
    assert_eq!(manifest, report.manifest);
    assert_eq!(manifest.framework, "Silex");
    assert_eq!(manifest.document_root, "web");
    assert_eq!(manifest.index_document, "index.php");
    assert_eq!(manifest.extension_api, "20121212");
    assert_eq!(manifest.libraries, vec!["libhiredis"]);
    assert_eq!(manifest.log_files, vec!["var/app.log"]);
    assert_eq!(manifest.php_config, vec!["short_open_tag = On"]);
}

#[tokio::test]
async fn test_rebuild_uses_cache() {
    let app = App::new();

    let first = app.compiler(&app.checkout("build1")).compile().await.unwrap();
    assert!(first.packages.iter().all(|p| !p.from_cache));

    let second = app.compiler(&app.checkout("build2")).compile().await.unwrap();
    assert_eq!(second.packages.len(), 2);
    assert!(second.packages.iter().all(|p| p.from_cache));
    assert!(app.dir.path().join("build2/vendor/libhiredis/lib/libhiredis.so").is_file());
}

#[tokio::test]
async fn test_missing_lock_file_aborts() {
    let app = App::new();
    let build = app.checkout("build");
    std::fs::remove_file(build.join("composer.lock")).unwrap();

    let err = app.compiler(&build).compile().await.unwrap_err();
    assert!(matches!(err, BuildpackError::MissingLockFile));
}

#[tokio::test]
async fn test_missing_runtime_aborts() {
    let app = App::new();
    let build = app.checkout("build");
    std::fs::write(
        build.join("phpbp.toml"),
        "[buildpack]\nphp-version = \"5.4.17\"\n",
    )
    .unwrap();

    let err = app.compiler(&build).compile().await.unwrap_err();
    assert!(matches!(err, BuildpackError::DownloadFailed { ref package, .. } if package == "php-5.4.17"));
}
