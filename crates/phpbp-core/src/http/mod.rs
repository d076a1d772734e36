//! HTTP access to the package catalog.

mod client;

pub use client::{HttpClient, HttpClientConfig, HttpError};
