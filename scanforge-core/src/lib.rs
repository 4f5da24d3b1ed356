//! scanforge-core: uniform invocation and result normalization for external
//! security tools

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod invocation;
pub mod mcp;
pub mod parsers;
pub mod pillage;
pub mod platforms;
pub mod records;
pub mod tools;

pub use error::{Error, Result};
