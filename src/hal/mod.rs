//! Concrete implementations of the traits in [`crate::traits`].
//!
//! # Available Implementations
//!
//! - `mock`: test doubles for the panel and clock
//! - `png`: a desktop panel that writes every frame to a PNG file

pub mod mock;
pub mod png;

pub use mock::*;
pub use png::*;
