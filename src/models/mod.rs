//! Domain models
//!
//! This module contains the stored rule shape and the filters used to select rules.

pub mod filter;
pub mod rule;

pub use filter::*;
pub use rule::*;
