//! # fes-core
//!
//! Core crate for Fes. Contains the unified error system, the build
//! environment and path table types, and the static user configuration
//! loader together with the resolver that merges plugin-declared defaults.
//!
//! This crate has **no** internal dependencies on other Fes crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::FesError;
pub use result::FesResult;
