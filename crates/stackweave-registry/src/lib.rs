//! Stackweave registry crate.
//!
//! Holds the declarations of a compilation nest ([`TypeNest`]): the types
//! being lowered together, plus the external types they refer to.

mod nest;

pub use nest::{RegistryError, TypeNest};
