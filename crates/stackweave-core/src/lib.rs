//! Stackweave core types.
//!
//! The data model shared by the registry and the compiler:
//!
//! - [`node`]: the immutable instruction tree ([`Node`], [`NodeKind`])
//! - [`types`]: type descriptors ([`TypeRef`], [`Primitive`], [`TypeAlias`])
//! - [`decl`]: type and member declarations of a compilation nest
//! - [`type_hash`]: deterministic member identity ([`TypeHash`])
//! - [`error`]: the lowering error taxonomy ([`LoweringError`])

pub mod decl;
pub mod error;
pub mod node;
pub mod type_hash;
pub mod types;

pub use decl::{ConstructorDecl, FieldDecl, MethodDecl, Modifiers, Param, TypeDecl, TypeKind};
pub use error::LoweringError;
pub use node::{
    ArithOp, Case, Catch, CompareOp, InvokeKind, Iteration, Literal, LogicalOp, Node, NodeKind,
    SwitchKind,
};
pub use type_hash::TypeHash;
pub use types::{MethodSpec, Primitive, TypeAlias, TypeRef, well_known};

pub use ordered_float::OrderedFloat;
