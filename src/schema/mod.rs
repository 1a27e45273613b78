//! Type schemas: the parsed model, its document format, and the registry
//! that maps object kinds onto it.

mod document;
mod elements;
mod registry;

pub use document::*;
pub use elements::*;
pub use registry::*;
