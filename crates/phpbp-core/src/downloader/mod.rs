//! Package downloading and extraction module.
//!
//! Packages come from a [`Catalog`] (HTTP or a local mirror), are cached in
//! the build cache keyed by identifier, and are extracted into their install
//! location by the [`Fetcher`].

mod archive;
mod catalog;
mod checksum;
mod fetcher;

pub use archive::ArchiveExtractor;
pub use catalog::{open_catalog, Catalog, DirCatalog, HttpCatalog};
pub use checksum::{compute_checksum, verify_checksum, ChecksumType};
pub use fetcher::{FetchResult, Fetcher};
