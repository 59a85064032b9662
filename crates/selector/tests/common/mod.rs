//! Test infrastructure for the selector compiler.
//!
//! Integration tests build a small [`Site`] over an in-memory SQLite
//! database and compile selectors against it.

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;
