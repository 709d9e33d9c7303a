//! Helpers for the whole-listing analysis passes.
//!
//! The passes themselves (`analyze_operands`, `calc_function_bounds`)
//! live on [`crate::listing::Listing`]; this module holds the pure
//! classification routines they are built from.

pub mod operands;
pub mod strings;
