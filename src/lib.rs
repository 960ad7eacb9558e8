//! Resumable bulk downloader for HLS granules published through NASA's
//! Earthdata catalog.
//!
//! A run searches the catalog for one tile and date range, keeps the band
//! files that were asked for, and streams each one into a flat output
//! directory. Files already present are skipped, so running the same request
//! again only fetches what is still missing.

pub mod app;
pub mod catalog;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod granule;
pub mod output;
pub mod rate;
pub mod session;
pub mod store;
