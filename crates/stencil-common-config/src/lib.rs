//! Generation manifests for Stencil.
//!
//! A manifest (`stencil.yaml`) declares the generator defaults and the list
//! of builders to register, so a generation session can be driven without
//! writing Rust.

pub mod env;
pub mod loader;
pub mod types;

pub use env::*;
pub use loader::*;
pub use types::*;
