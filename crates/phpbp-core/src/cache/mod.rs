//! Build cache for downloaded package tarballs.
//!
//! Layout under the cache root:
//! - `package/<id>.tgz` - last downloaded tarball
//! - `package/<id>.md5` - checksum the tarball was downloaded for

mod checksum_store;

pub use checksum_store::ChecksumStore;
