pub mod cache;
pub mod compile;
pub mod composer;
pub mod config;
pub mod context;
pub mod downloader;
pub mod env;
pub mod error;
pub mod extension;
pub mod framework;
pub mod http;
pub mod layout;
pub mod outcome;
pub mod package;
pub mod supervisor;
pub mod template;

pub use error::{BuildpackError, Result};
pub use outcome::Outcome;
pub use package::PackageId;
pub use cache::ChecksumStore;
pub use downloader::{Catalog, DirCatalog, FetchResult, Fetcher, HttpCatalog};
pub use extension::{ExtensionGraph, ExtensionResolver, InstalledLibs, Resolution};
pub use config::{BuildpackConfig, ComposerJson};
pub use context::BuildContext;
pub use framework::{Framework, FrameworkRegistry};
pub use layout::{LayoutBuilder, RuntimeLayout, RuntimeManifest};
pub use compile::{CompileReport, Compiler};
pub use supervisor::{boot, BootOptions, ProcessExit, ProcessSpec, Supervisor, SupervisorState};
