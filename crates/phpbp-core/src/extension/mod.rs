//! PHP extension resolution.
//!
//! Extensions are enabled through `<ext>.ini` files in the runtime's scan
//! directory. Some extensions need a native library, which is fetched into
//! its own location and recorded in [`InstalledLibs`] so the layout builder
//! can move it into the slug.

mod graph;
mod installed;
mod resolver;

pub use graph::{ExtensionGraph, NativeDependency};
pub use installed::InstalledLibs;
pub use resolver::{ExtensionResolver, ExtensionStatus, Resolution, RuntimePaths};
