//! HTTP transport used by the REST adapters.

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
