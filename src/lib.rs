//! Client for a remote filesystem configured the Hadoop way.
//!
//! A [`ConfigLocation`] names a directory holding `core-site.xml` and
//! `hdfs-site.xml`. A [`DfsClient`] loads both, connects to the filesystem
//! named by `fs.defaultFS` and moves files between it and the local disk.

#[macro_use]
extern crate log;
#[macro_use]
extern crate async_trait;

/// Upload, download, delete and mkdir
pub mod client;
/// Site files and the properties they carry
pub mod config;
mod error;
/// Filesystem handles behind `fs.defaultFS`
pub mod fs;
pub mod utils;

pub use client::{DfsClient, Outcome};
pub use config::{ConfigLocation, Configuration};
pub use error::{ConnectionError, Error, Result, ValidationError, ValidationFailure};
