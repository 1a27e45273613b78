//! Merge module - writes by multiple managers to one object.
//!
//! [`Updater`] turns a live object, its [`ManagedFields`](crate::fieldpath::ManagedFields)
//! and a write (apply or update) into the new object and the new ownership records.

mod conflict;
mod object;
mod updater;



pub use conflict::*;
pub use object::*;
pub use updater::*;
