//! EPI downloader library
//!
//! Bulk downloads datasets from the IHME EPI visualisation website
//! (<https://vizhub.healthdata.org/epi>), caching every response on disk and
//! combining the selected datasets into one CSV file.

pub mod app;
pub mod cache;
pub mod cli;
pub mod combine;
pub mod data;
pub mod download;
pub mod error;
pub mod fs_util;

pub use error::{Error, Result};
