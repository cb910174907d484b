//! pinguard Common Library
//!
//! This crate provides the pin vocabulary, the driver boundary and the
//! configuration shared by the pinguard workspace crates.
//!
//! # Module Structure
//!
//! - [`level`] - Pin identifiers and three-valued logic levels
//! - [`io`] - `PinDriver` trait and I/O errors
//! - [`config`] - TOML configuration and loader
//! - [`consts`] - Default cadences, retry limits and rule table
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! pinguard_common = { path = "../pinguard_common" }
//! ```
//!
//! ```rust
//! use pinguard_common::prelude::*;
//! ```

pub mod config;
pub mod consts;
pub mod io;
pub mod level;
pub mod prelude;
