//! Utility types and functions.
//!
//! This module contains fundamental types used throughout the library:
//! - [`ComponentType`] - Fixed-width numeric encodings and their codec
//! - [`MetadataValue`] - Decoded metadata values and deep comparisons
//! - [`Error`] / [`Result`] - Error handling

mod component;
mod error;
mod values;

pub use component::*;
pub use error::*;
pub use values::*;
