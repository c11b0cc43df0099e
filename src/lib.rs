//! Tracery parses OpenType/TrueType fonts and extracts glyph outlines.
//!
//! This is a #![no_std] crate, but still requires the alloc crate.
//!
//! Outlines come from two pipelines: the glyf/loca tables for TrueType curves, optionally
//! varied through gvar, and the CFF/CFF2 tables whose Type 2 charstring programs are executed
//! by a small virtual machine. Both produce the same contour model. Rasterization, hinting,
//! and shaping are out of scope.

#![no_std]
#![allow(dead_code)]

extern crate alloc;

mod charstring;
mod math;
mod outline;
/// The raw byte stream reader the table parsers are built on.
pub mod parse;
mod table;

pub use crate::outline::{Bounds, Contour, Point};
pub use crate::table::*;

/// Alias for Result<T, &'static str>.
pub type FontResult<T> = Result<T, &'static str>;
