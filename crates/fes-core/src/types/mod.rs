//! Core type definitions used across the Fes workspace.

pub mod env;
pub mod paths;

pub use env::Env;
pub use paths::Paths;
