//! Typed values: raw objects paired with their schema type.
//!
//! Everything the merge coordinator does to an object goes through here:
//! validation, field sets, extraction, merging and comparison.

mod comparison;
mod extract;
mod keys;
mod merge;
mod parser;
mod typed_value;
mod validation;



pub use comparison::*;
pub use keys::*;
pub use merge::*;
pub use parser::*;
pub use typed_value::*;
pub use validation::*;
